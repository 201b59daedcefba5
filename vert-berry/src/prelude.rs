//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{CtData3d, CtLabel, CtScan, HuRescale};
pub use crate::{SampleError, SampleResult};

pub use crate::consts::gray::{BACKGROUND, FOREGROUND};
pub use crate::consts::{RegionKind, CUBE_SIZE};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{self, CsiDataset, MemorySource, Subset, VolumeSource};

pub use crate::sample::{
    AugmentConfig, KernelConfig, Kernels, PatchPipeline, PipelineConfig, Sample,
    SampleGenerator, SamplerConfig, VolumeTransform, WeightSpec,
};
