//! 采样统计.

use std::time::{Duration, Instant};
use vert_berry::sample::Sample;
use vert_berry::SampleError;

/// 累计计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::from_secs(0),
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    pub fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    pub fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// 一组采样任务的统计.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    /// 成功生成的样本数.
    samples: u64,

    /// 其中在整幅扫描中取样的个数.
    background: u64,

    /// 其中完整的个数.
    complete: u64,

    /// 可见体积比之和.
    ratio_sum: f64,

    /// 四种增强各自触发的次数: 弹性, 模糊, 噪声, 裁剪平移.
    augmented: [u64; 4],

    /// 因为标注中没有椎骨而失败的次数.
    empty_mask: u64,

    /// 其他失败 (读取错误等) 次数.
    failures: u64,

    /// 生成样本花费的总时间.
    sample_time: AccTimer,

    /// 最耗时的一次采样.
    most: Option<Duration>,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始一次采样计时.
    #[inline]
    pub fn sample_start(&mut self) {
        self.sample_time.start();
    }

    /// 结束一次采样计时.
    #[inline]
    pub fn sample_elapsed(&mut self) {
        let d = self.sample_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 记录一个成功的样本.
    pub fn count_sample(&mut self, s: &Sample) {
        self.samples += 1;
        self.background += s.region.is_background() as u64;
        self.complete += s.complete as u64;
        self.ratio_sum += s.ratio;
        let a = &s.augmented;
        for (slot, fired) in self
            .augmented
            .iter_mut()
            .zip([a.elastic, a.blur, a.noise, a.crop_shift.is_some()])
        {
            *slot += fired as u64;
        }
    }

    /// 记录一次失败.
    pub fn count_error(&mut self, e: &SampleError) {
        match e {
            SampleError::EmptyMask => self.empty_mask += 1,
            _ => self.failures += 1,
        }
    }

    /// 合并另一份统计.
    pub fn merge(&mut self, other: &Profile) {
        self.samples += other.samples;
        self.background += other.background;
        self.complete += other.complete;
        self.ratio_sum += other.ratio_sum;
        for (a, b) in self.augmented.iter_mut().zip(other.augmented) {
            *a += b;
        }
        self.empty_mask += other.empty_mask;
        self.failures += other.failures;
        self.sample_time.consumed += other.sample_time.consumed;
        self.most = match (self.most, other.most) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// 获得成功样本数.
    #[inline]
    pub fn get_samples(&self) -> u64 {
        self.samples
    }

    /// 获得失败次数, `(标注为空, 其他)`.
    #[inline]
    pub fn get_failures(&self) -> (u64, u64) {
        (self.empty_mask, self.failures)
    }

    /// 获得各增强步骤的触发次数.
    #[inline]
    pub fn get_augmented(&self) -> [u64; 4] {
        self.augmented
    }

    /// 以微秒为单位获得采样总时间.
    #[inline]
    pub fn get_sample_time_us(&self) -> u64 {
        self.sample_time.get_total_us()
    }

    #[inline]
    fn fraction(&self, count: u64) -> Option<f64> {
        match self.samples {
            0 => None,
            n => Some(count as f64 / n as f64),
        }
    }

    /// 全图取样比例.
    #[inline]
    pub fn get_background_fraction(&self) -> Option<f64> {
        self.fraction(self.background)
    }

    /// 完整样本比例.
    #[inline]
    pub fn get_complete_fraction(&self) -> Option<f64> {
        self.fraction(self.complete)
    }

    /// 平均可见体积比.
    #[inline]
    pub fn get_avg_ratio(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.ratio_sum / self.samples as f64)
    }

    /// 平均每个样本耗时 (微秒).
    #[inline]
    pub fn get_avg_sample_time_us(&self) -> Option<f64> {
        self.fraction(self.get_sample_time_us())
    }

    /// 获取最耗时的一次采样. 如果不存在, 则返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_errors() {
        let mut a = Profile::new();
        a.count_error(&SampleError::EmptyMask);
        a.sample_start();
        a.sample_elapsed();

        let mut b = Profile::new();
        b.count_error(&SampleError::IndexOutOfRange(3, 2));
        a.merge(&b);

        assert_eq!(a.get_failures(), (1, 1));
        assert_eq!(a.get_samples(), 0);
        assert!(a.get_avg_ratio().is_none());
        assert!(a.get_most_time_consuming().is_some());
    }
}
