//! 完整的单样本采样流水线.
//!
//! 数据源 -> 实例选择 -> patch 裁剪 -> 数据增强 -> {完整性标签, 边界加权图}.

use ndarray::{arr1, Array1, Array3, Array4, Axis};
use rand::Rng;

use super::{
    AugmentConfig, Augmented, Augmenter, Completeness, InstanceMasks, KernelConfig, Kernels,
    PatchSampler, SamplerConfig, VolumeTransform, WeightSpec, Window,
};
use crate::consts::{RegionKind, COMPLETE_THRESHOLD};
use crate::dataset::VolumeSource;
use crate::{CtData3d, SampleError, SampleResult};

/// 流水线各阶段配置的汇总.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// patch 采样.
    pub sampler: SamplerConfig,

    /// 数据增强.
    pub augment: AugmentConfig,

    /// 默认变换原语的参数. 只有 [`PatchPipeline::new`] 会用到.
    pub kernel: KernelConfig,

    /// 边界加权.
    pub weight: WeightSpec,

    /// 完整性阈值.
    pub complete_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            augment: AugmentConfig::default(),
            kernel: KernelConfig::default(),
            weight: WeightSpec::default(),
            complete_threshold: COMPLETE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// 检查配置是否合法.
    pub fn validate(&self) -> SampleResult<()> {
        self.sampler.validate()?;
        self.augment.validate()?;
        self.kernel.validate()?;
        if !self.weight.is_valid() {
            return Err(SampleError::InvalidConfig(
                "weight parameters must be finite with omega > 0",
            ));
        }
        if !self.complete_threshold.is_finite() {
            return Err(SampleError::InvalidConfig("complete_threshold must be finite"));
        }
        Ok(())
    }
}

/// 一个训练样本.
///
/// 三个 patch 带有长度为 1 的通道维, 形状为 `[1, C, C, C]`;
/// 加权图没有通道维, 形状为 `[C, C, C]`.
#[derive(Debug, Clone)]
pub struct Sample {
    /// 扫描 patch.
    pub image: Array4<f32>,

    /// 先验实例 patch.
    pub instance: Array4<u8>,

    /// 真值 patch.
    pub ground_truth: Array4<u8>,

    /// 边界加权图.
    pub weight: Array3<f32>,

    /// 完整性标签, 0 或 1.
    pub complete: u8,

    /// 被选中的椎骨标签.
    pub chosen: u8,

    /// 取样区域来源.
    pub region: RegionKind,

    /// 原数据上的裁剪窗口.
    pub window: Window,

    /// 可见体积比.
    pub ratio: f64,

    /// 实际执行的增强步骤.
    pub augmented: Augmented,
}

impl Sample {
    /// patch 边长.
    #[inline]
    pub fn cube_size(&self) -> usize {
        self.weight.len_of(Axis(0))
    }

    /// 以长度为 1 的数组给出的完整性标签.
    #[inline]
    pub fn complete_array(&self) -> Array1<u8> {
        arr1(&[self.complete])
    }
}

/// 单样本采样流水线. `T` 为数据增强使用的变换原语.
#[derive(Debug, Clone)]
pub struct PatchPipeline<T = Kernels> {
    sampler: PatchSampler,
    augmenter: Augmenter<T>,
    weight: WeightSpec,
    complete_threshold: f64,
}

impl PatchPipeline<Kernels> {
    /// 以 `config.kernel` 为参数的默认变换原语创建流水线.
    pub fn new(config: PipelineConfig) -> SampleResult<Self> {
        Self::with_transform(config, Kernels::new(config.kernel)?)
    }
}

impl<T: VolumeTransform> PatchPipeline<T> {
    /// 使用自定义变换原语创建流水线. 配置不合法时返回 `Err`.
    pub fn with_transform(config: PipelineConfig, transform: T) -> SampleResult<Self> {
        config.validate()?;
        Ok(Self {
            sampler: PatchSampler::new(config.sampler)?,
            augmenter: Augmenter::new(config.augment, transform)?,
            weight: config.weight,
            complete_threshold: config.complete_threshold,
        })
    }

    /// patch 采样器.
    #[inline]
    pub fn sampler(&self) -> &PatchSampler {
        &self.sampler
    }

    /// 数据增强编排器.
    #[inline]
    pub fn augmenter(&self) -> &Augmenter<T> {
        &self.augmenter
    }

    /// 边界加权参数.
    #[inline]
    pub fn weight_spec(&self) -> &WeightSpec {
        &self.weight
    }

    /// 从一对 (扫描, 标注) 中生成一个样本. 所有中间结果都重新计算.
    ///
    /// 标注中没有正标签时返回 [`SampleError::EmptyMask`].
    pub fn sample<R: Rng + ?Sized>(&self, data: &CtData3d, rng: &mut R) -> SampleResult<Sample> {
        let masks = InstanceMasks::select(data.label.data(), rng)?;
        let full_count = masks.truth_count();

        let cropped = self.sampler.sample(&data.scan, &masks, rng)?;
        let (patches, augmented) = self.augmenter.apply(cropped.patches, rng);

        let completeness =
            Completeness::evaluate(patches.truth.view(), full_count, self.complete_threshold);
        let weight = self.weight.weight_map(patches.truth.view());
        log::debug!(
            "instance {} ({:?}): visible ratio {:.4}, complete = {}",
            masks.chosen,
            cropped.region.kind,
            completeness.ratio,
            completeness.label
        );

        Ok(Sample {
            image: patches.image.insert_axis(Axis(0)),
            instance: patches.instance.insert_axis(Axis(0)),
            ground_truth: patches.truth.insert_axis(Axis(0)),
            weight,
            complete: completeness.label,
            chosen: masks.chosen,
            region: cropped.region.kind,
            window: cropped.window,
            ratio: completeness.ratio,
            augmented,
        })
    }
}

/// 数据源 + 流水线. 按索引生成样本.
#[derive(Debug, Clone)]
pub struct SampleGenerator<S, T = Kernels> {
    source: S,
    pipeline: PatchPipeline<T>,
}

impl<S: VolumeSource, T: VolumeTransform> SampleGenerator<S, T> {
    /// 组合数据源和流水线.
    #[inline]
    pub fn new(source: S, pipeline: PatchPipeline<T>) -> Self {
        Self { source, pipeline }
    }

    /// 数据源.
    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// 流水线.
    #[inline]
    pub fn pipeline(&self) -> &PatchPipeline<T> {
        &self.pipeline
    }

    /// 数据对个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// 数据源是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// 读取第 `index` 个数据对并生成一个样本.
    pub fn generate<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> SampleResult<Sample> {
        let data = self.source.get(index)?;
        self.pipeline.sample(&data, rng)
    }
}
