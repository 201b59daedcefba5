//! 统计结果.

use crate::profile::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    #[inline]
    fn u64_to_display(u: Option<u64>) -> String {
        match u {
            Some(u) => u.to_string(),
            None => "/".to_string(),
        }
    }

    let (empty, failures) = p.get_failures();
    let [elastic, blur, noise, crop] = p.get_augmented();
    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Samples: {}", p.get_samples())?;
    writeln!(w, "{S4}Empty label volumes: {empty}")?;
    writeln!(w, "{S4}Other failures: {failures}")?;
    writeln!(
        w,
        "{S4}Background regions: {}",
        f64_to_display(p.get_background_fraction())
    )?;
    writeln!(
        w,
        "{S4}Complete samples: {}",
        f64_to_display(p.get_complete_fraction())
    )?;
    writeln!(
        w,
        "{S4}Average visible ratio: {}",
        f64_to_display(p.get_avg_ratio())
    )?;
    writeln!(
        w,
        "{S4}Augmentations (elastic/blur/noise/crop): {elastic}/{blur}/{noise}/{crop}"
    )?;
    writeln!(w, "{S4}Total sampling time: {} us", p.get_sample_time_us())?;
    writeln!(
        w,
        "{S4}Average sampling time: {} us",
        f64_to_display(p.get_avg_sample_time_us())
    )?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros() as u64);
    write!(w, "{S4}Most time-consuming sample costs {} us", u64_to_display(t))?;
    Ok(())
}

/// 最终结果: 每个工作线程一份统计, 以及它们的合计.
pub struct CensusResult {
    workers: Vec<Profile>,
    total: Profile,
}

impl CensusResult {
    /// 由各工作线程的统计构建.
    pub fn from_workers(workers: Vec<Profile>) -> Self {
        let total = workers.iter().fold(Profile::new(), |mut acc, p| {
            acc.merge(p);
            acc
        });
        Self { workers, total }
    }

    /// 合计统计.
    #[inline]
    pub fn total(&self) -> &Profile {
        &self.total
    }

    /// 输出运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (i, profile) in self.workers.iter().enumerate() {
            describe_into(&format!("worker {i}"), profile, &mut buf)?;
            buf.push(b'\n');
        }
        describe_into("total", &self.total, &mut buf)?;
        println!("{}", String::from_utf8_lossy(&buf));

        utils::sep();
        Ok(())
    }
}
