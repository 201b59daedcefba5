//! 程序运行函数.

use crate::profile::Profile;
use crate::result::CensusResult;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::thread;
use utils::loader;
use vert_berry::prelude::*;

/// 每个数据对默认采样的次数.
const DRAWS_PER_VOLUME: usize = 4;

/// 默认随机种子.
const DEFAULT_SEED: u64 = 2014;

/// 运行参数, 均可由环境变量覆盖.
#[derive(Debug, Clone)]
struct Settings {
    /// `$CENSUS_DRAWS`: 每个数据对采样次数.
    draws: usize,

    /// `$CENSUS_SEED`: 第 `i` 个工作线程的种子为 `seed + i`.
    seed: u64,

    /// `$CENSUS_WORKERS`: 工作线程数.
    workers: usize,

    /// `$CENSUS_DUMP`: 若设置, 第一个成功样本写入该 npz 文件.
    dump: Option<PathBuf>,
}

impl Settings {
    fn from_env(len: usize) -> Self {
        let workers = utils::env_usize("CENSUS_WORKERS", utils::cpus()).clamp(1, len.max(1));
        Self {
            draws: utils::env_usize("CENSUS_DRAWS", DRAWS_PER_VOLUME),
            seed: utils::env_u64("CENSUS_SEED", DEFAULT_SEED),
            workers,
            dump: std::env::var_os("CENSUS_DUMP").map(PathBuf::from),
        }
    }
}

/// 第 `worker` 个线程负责的索引为 `worker, worker + workers, ...`.
fn work<S: VolumeSource>(
    generator: &SampleGenerator<S>,
    settings: &Settings,
    worker: usize,
) -> Profile {
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed + worker as u64);
    let mut profile = Profile::new();
    let mut dumped = worker != 0 || settings.dump.is_none();

    for index in (worker..generator.len()).step_by(settings.workers) {
        let data = match generator.source().get(index) {
            Ok(data) => data,
            Err(e) => {
                log::error!("failed to load volume #{index}: {e}");
                profile.count_error(&e);
                continue;
            }
        };
        for _ in 0..settings.draws {
            profile.sample_start();
            let r = generator.pipeline().sample(&data, &mut rng);
            profile.sample_elapsed();
            match r {
                Ok(s) => {
                    profile.count_sample(&s);
                    if !dumped {
                        if let Some(p) = settings.dump.as_ref() {
                            match s.save_npz(p) {
                                Ok(()) => log::info!("sample dumped to {}", p.display()),
                                Err(e) => log::error!("failed to dump sample: {e}"),
                            }
                        }
                        dumped = true;
                    }
                }
                Err(e) => {
                    log::warn!("volume #{index}: {e}");
                    profile.count_error(&e);
                }
            }
        }
    }
    log::debug!("worker {worker} done");
    profile
}

/// 实际运行.
pub fn run() -> SampleResult<CensusResult> {
    let dataset = loader::csi_train_from_env_or_home()?;
    if dataset.is_empty() {
        log::warn!("no scan found, nothing to do");
    }
    let settings = Settings::from_env(dataset.len());
    log::info!(
        "{} volumes, {} draws each, {} workers, seed {}",
        dataset.len(),
        settings.draws,
        settings.workers,
        settings.seed
    );

    let generator = SampleGenerator::new(dataset, PatchPipeline::new(PipelineConfig::default())?);
    let profiles = thread::scope(|s| {
        let handles: Vec<_> = (0..settings.workers)
            .map(|w| {
                let (generator, settings) = (&generator, &settings);
                s.spawn(move || work(generator, settings, w))
            })
            .collect();
        handles
            .into_iter()
            .map(|th| th.join().expect("Thread joining error"))
            .collect::<Vec<_>>()
    });

    Ok(CensusResult::from_workers(profiles))
}
