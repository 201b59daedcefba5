//! 随机数据增强的编排.
//!
//! 具体的体数据变换由 [`VolumeTransform`] 提供, 本模块只负责按概率决定
//! 是否执行每一步, 以及执行的先后顺序.

use ndarray::{Array3, ArrayView3};
use rand::Rng;

use super::Patches;
use crate::consts::{AUGMENT_PROB, DOCUMENTED_CROP_PROB, ELASTIC_ALPHA, ELASTIC_SIGMA};
use crate::{SampleError, SampleResult};

/// 体数据增强原语.
///
/// 前三个操作只作用于扫描 patch, 输出形状必须与输入相同;
/// `crop_shift` 对三个 patch 做同样的几何变换.
pub trait VolumeTransform {
    /// 弹性形变. `alpha` 为位移幅度, `sigma` 为位移场平滑尺度.
    fn elastic<R: Rng + ?Sized>(
        &self,
        image: ArrayView3<f32>,
        alpha: f64,
        sigma: f64,
        rng: &mut R,
    ) -> Array3<f32>;

    /// 高斯模糊.
    fn gaussian_blur<R: Rng + ?Sized>(&self, image: ArrayView3<f32>, rng: &mut R) -> Array3<f32>;

    /// 加性高斯噪声.
    fn gaussian_noise<R: Rng + ?Sized>(&self, image: ArrayView3<f32>, rng: &mut R) -> Array3<f32>;

    /// 沿第 0 轴的裁剪平移, `k` 在 `0..=cube_size` 之间.
    fn crop_shift(&self, patches: Patches, k: usize) -> Patches;
}

/// 数据增强配置. 四个概率各自独立.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AugmentConfig {
    /// 执行弹性形变的概率.
    pub elastic_prob: f64,

    /// 执行高斯模糊的概率.
    pub blur_prob: f64,

    /// 执行高斯噪声的概率.
    pub noise_prob: f64,

    /// 执行裁剪平移的概率.
    pub crop_prob: f64,

    /// 弹性形变的位移幅度.
    pub elastic_alpha: f64,

    /// 弹性形变的平滑尺度.
    pub elastic_sigma: f64,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            elastic_prob: AUGMENT_PROB,
            blur_prob: AUGMENT_PROB,
            noise_prob: AUGMENT_PROB,
            crop_prob: AUGMENT_PROB,
            elastic_alpha: ELASTIC_ALPHA,
            elastic_sigma: ELASTIC_SIGMA,
        }
    }
}

impl AugmentConfig {
    /// 不做任何增强.
    pub fn disabled() -> Self {
        Self {
            elastic_prob: 0.0,
            blur_prob: 0.0,
            noise_prob: 0.0,
            crop_prob: 0.0,
            ..Self::default()
        }
    }

    /// 裁剪平移的概率改为 20%, 其余不变.
    #[inline]
    pub fn with_documented_crop_prob(mut self) -> Self {
        self.crop_prob = DOCUMENTED_CROP_PROB;
        self
    }

    /// 检查配置是否合法.
    pub fn validate(&self) -> SampleResult<()> {
        let probs = [
            self.elastic_prob,
            self.blur_prob,
            self.noise_prob,
            self.crop_prob,
        ];
        if !probs.iter().all(|p| (0.0..=1.0).contains(p)) {
            return Err(SampleError::InvalidConfig(
                "augmentation probabilities must lie in [0, 1]",
            ));
        }
        if !(self.elastic_alpha.is_finite() && self.elastic_alpha >= 0.0) {
            return Err(SampleError::InvalidConfig("elastic_alpha must be non-negative"));
        }
        if !(self.elastic_sigma.is_finite() && self.elastic_sigma > 0.0) {
            return Err(SampleError::InvalidConfig("elastic_sigma must be positive"));
        }
        Ok(())
    }
}

/// 一次增强中实际执行了哪些步骤.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Augmented {
    /// 弹性形变.
    pub elastic: bool,

    /// 高斯模糊.
    pub blur: bool,

    /// 高斯噪声.
    pub noise: bool,

    /// 裁剪平移及其 `k`.
    pub crop_shift: Option<usize>,
}

impl Augmented {
    /// 是否没有执行任何步骤.
    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// 数据增强编排器.
#[derive(Debug, Clone)]
pub struct Augmenter<T> {
    config: AugmentConfig,
    transform: T,
}

impl<T: VolumeTransform> Augmenter<T> {
    /// 创建编排器. 配置不合法时返回 `Err`.
    pub fn new(config: AugmentConfig, transform: T) -> SampleResult<Self> {
        config.validate()?;
        Ok(Self { config, transform })
    }

    /// 增强配置.
    #[inline]
    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// 使用的变换原语.
    #[inline]
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// 依次以各自的概率执行弹性形变, 模糊, 噪声, 裁剪平移.
    ///
    /// 前三步只改变扫描 patch; 裁剪平移同时作用于三个 patch,
    /// 其 `k` 在 `0..=` 第 0 轴长度之间均匀选取.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        mut patches: Patches,
        rng: &mut R,
    ) -> (Patches, Augmented) {
        let c = &self.config;
        let mut done = Augmented::default();

        if rng.gen_bool(c.elastic_prob) {
            patches.image = self.transform.elastic(
                patches.image.view(),
                c.elastic_alpha,
                c.elastic_sigma,
                rng,
            );
            done.elastic = true;
        }
        if rng.gen_bool(c.blur_prob) {
            patches.image = self.transform.gaussian_blur(patches.image.view(), rng);
            done.blur = true;
        }
        if rng.gen_bool(c.noise_prob) {
            patches.image = self.transform.gaussian_noise(patches.image.view(), rng);
            done.noise = true;
        }
        if rng.gen_bool(c.crop_prob) {
            let k = rng.gen_range(0..=patches.dim().0);
            patches = self.transform.crop_shift(patches, k);
            done.crop_shift = Some(k);
        }

        log::debug!("augmentation {done:?}");
        (patches, done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::cell::RefCell;

    /// 记录调用顺序, 并以容易辨认的方式修改数据.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<&'static str>>,
    }

    impl VolumeTransform for Recorder {
        fn elastic<R: Rng + ?Sized>(
            &self,
            image: ArrayView3<f32>,
            alpha: f64,
            sigma: f64,
            _rng: &mut R,
        ) -> Array3<f32> {
            assert_eq!((alpha, sigma), (ELASTIC_ALPHA, ELASTIC_SIGMA));
            self.calls.borrow_mut().push("elastic");
            image.mapv(|v| v + 1.0)
        }

        fn gaussian_blur<R: Rng + ?Sized>(
            &self,
            image: ArrayView3<f32>,
            _rng: &mut R,
        ) -> Array3<f32> {
            self.calls.borrow_mut().push("blur");
            image.mapv(|v| v * 2.0)
        }

        fn gaussian_noise<R: Rng + ?Sized>(
            &self,
            image: ArrayView3<f32>,
            _rng: &mut R,
        ) -> Array3<f32> {
            self.calls.borrow_mut().push("noise");
            image.mapv(|v| v + 100.0)
        }

        fn crop_shift(&self, mut patches: Patches, _k: usize) -> Patches {
            self.calls.borrow_mut().push("crop");
            patches.truth.fill(0);
            patches
        }
    }

    fn patches() -> Patches {
        Patches {
            image: Array3::zeros((4, 4, 4)),
            instance: Array3::zeros((4, 4, 4)),
            truth: Array3::ones((4, 4, 4)),
        }
    }

    fn always() -> AugmentConfig {
        AugmentConfig {
            elastic_prob: 1.0,
            blur_prob: 1.0,
            noise_prob: 1.0,
            crop_prob: 1.0,
            ..AugmentConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let c = AugmentConfig::default();
        assert_eq!(c.crop_prob, 0.5);
        assert_eq!(c.with_documented_crop_prob().crop_prob, 0.2);
        assert!(c.validate().is_ok());
        assert!(AugmentConfig {
            blur_prob: 1.1,
            ..c
        }
        .validate()
        .is_err());
        assert!(AugmentConfig {
            elastic_sigma: 0.0,
            ..c
        }
        .validate()
        .is_err());
    }

    /// 所有步骤都执行时, 顺序固定为 弹性 -> 模糊 -> 噪声 -> 裁剪.
    #[test]
    fn test_order_and_targets() {
        let aug = Augmenter::new(always(), Recorder::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (out, done) = aug.apply(patches(), &mut rng);
        assert_eq!(
            *aug.transform().calls.borrow(),
            ["elastic", "blur", "noise", "crop"]
        );
        assert!(done.elastic && done.blur && done.noise);
        assert!(done.crop_shift.unwrap() <= 4);
        // (0 + 1) * 2 + 100
        assert!(out.image.iter().all(|&v| v == 102.0));
        assert!(out.instance.iter().all(|&v| v == 0));
        assert!(out.truth.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_disabled_is_identity() {
        let aug = Augmenter::new(AugmentConfig::disabled(), Recorder::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (out, done) = aug.apply(patches(), &mut rng);
        assert!(done.is_identity());
        assert!(aug.transform().calls.borrow().is_empty());
        assert!(out.truth.iter().all(|&v| v == 1));
        assert!(out.image.iter().all(|&v| v == 0.0));
    }

    /// 每一步在默认配置下大约一半的时间执行, 且 `k` 覆盖两个端点.
    #[test]
    fn test_default_frequencies() {
        let aug = Augmenter::new(AugmentConfig::default(), Recorder::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let n = 4000;
        let mut counts = [0usize; 4];
        let mut ks = std::collections::HashSet::new();
        for _ in 0..n {
            let (_, done) = aug.apply(patches(), &mut rng);
            counts[0] += done.elastic as usize;
            counts[1] += done.blur as usize;
            counts[2] += done.noise as usize;
            if let Some(k) = done.crop_shift {
                counts[3] += 1;
                ks.insert(k);
            }
        }
        for c in counts {
            let frac = c as f64 / n as f64;
            assert!((frac - 0.5).abs() < 0.05, "{counts:?}");
        }
        assert_eq!(ks.len(), 5);
    }
}
