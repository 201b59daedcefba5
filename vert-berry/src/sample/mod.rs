//! 随机训练样本生成.
//!
//! 每次采样依次经过:
//!
//! 1. [`InstanceMasks::select`]: 均匀选取一节椎骨, 生成先验实例掩码与真值掩码;
//! 2. [`PatchSampler::sample`]: 选取区域和中心, 裁剪并填充为定长立方体;
//! 3. [`Augmenter::apply`]: 按概率执行四种数据增强;
//! 4. [`Completeness::evaluate`] 与 [`WeightSpec::weight_map`]: 完整性标签和边界加权图.
//!
//! [`PatchPipeline`] 将以上步骤串起来, [`SampleGenerator`] 再加上数据源.
//! 随机性全部来自调用方传入的随机数发生器, 固定种子即可复现.

pub mod augment;
pub mod completeness;
pub mod edt;
pub mod export;
pub mod instance;
pub mod kernel;
pub mod patch;
pub mod pipeline;
pub mod weight;

pub use augment::{AugmentConfig, Augmented, Augmenter, VolumeTransform};
pub use completeness::Completeness;
pub use export::{ExportError, ExportResult, SampleArrays};
pub use instance::InstanceMasks;
pub use kernel::{KernelConfig, Kernels};
pub use patch::{Cropped, Patches, PatchSampler, Region, SamplerConfig, Window};
pub use pipeline::{PatchPipeline, PipelineConfig, Sample, SampleGenerator};
pub use weight::WeightSpec;
