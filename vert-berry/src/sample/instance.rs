//! 椎骨实例选择, 以及 "先验实例" 掩码和真值掩码的生成.

use itertools::Itertools;
use ndarray::{Array3, ArrayView3};
use rand::Rng;

use crate::consts::gray::*;
use crate::{SampleError, SampleResult};

/// 按升序收集标注中出现过的所有取值 (包括背景 0).
pub fn unique_labels(label: ArrayView3<u8>) -> Vec<u8> {
    let mut seen = [false; 256];
    label.iter().for_each(|&p| seen[p as usize] = true);
    (0..=u8::MAX).filter(|&v| seen[v as usize]).collect()
}

/// 从升序取值表 `unique` 中随机选取一个实例.
///
/// 候选为 `unique[1..]`. 按照标注约定 `unique[0]` 是背景 0,
/// 因此这等价于在所有出现过的正标签上均匀选取.
/// 若 `unique` 不超过一个元素 (只有背景), 返回 [`SampleError::EmptyMask`].
pub fn choose_instance<R: Rng + ?Sized>(unique: &[u8], rng: &mut R) -> SampleResult<u8> {
    if unique.len() <= 1 {
        return Err(SampleError::EmptyMask);
    }
    debug_assert!(unique.windows(2).all(|w| w[0] < w[1]));
    Ok(unique[rng.gen_range(1..unique.len())])
}

/// 先验实例掩码: 标签为正且严格小于 `chosen` 的体素为 1, 其余为 0.
///
/// 编号更小的椎骨被视为迭代分割中 "已经处理过" 的上下文.
pub fn prior_instances_mask(label: ArrayView3<u8>, chosen: u8) -> Array3<u8> {
    label.mapv(|p| (is_instance(p) && p < chosen) as u8)
}

/// 真值掩码: 标签等于 `chosen` 的体素为 1, 其余为 0.
pub fn ground_truth_mask(label: ArrayView3<u8>, chosen: u8) -> Array3<u8> {
    label.mapv(|p| if p == chosen { FOREGROUND } else { BACKGROUND })
}

/// 一次采样选中的实例及其两个全尺寸二值掩码.
#[derive(Debug, Clone)]
pub struct InstanceMasks {
    /// 被选中的椎骨标签.
    pub chosen: u8,

    /// 先验实例掩码, 与原标注同形状.
    pub prior: Array3<u8>,

    /// 真值掩码, 与原标注同形状.
    pub truth: Array3<u8>,
}

impl InstanceMasks {
    /// 从 `label` 中随机选取一个实例并生成掩码.
    pub fn select<R: Rng + ?Sized>(label: ArrayView3<u8>, rng: &mut R) -> SampleResult<Self> {
        let unique = unique_labels(label);
        let chosen = choose_instance(&unique, rng)?;
        log::debug!(
            "chose instance {chosen} out of [{}]",
            unique[1..].iter().join(", ")
        );
        Ok(Self::with_chosen(label, chosen))
    }

    /// 使用给定的 `chosen` 生成掩码. 不检查 `chosen` 是否真的出现在 `label` 中.
    pub fn with_chosen(label: ArrayView3<u8>, chosen: u8) -> Self {
        Self {
            chosen,
            prior: prior_instances_mask(label, chosen),
            truth: ground_truth_mask(label, chosen),
        }
    }

    /// 真值掩码中前景体素的个数, 即整节椎骨的体积.
    #[inline]
    pub fn truth_count(&self) -> usize {
        self.truth.iter().filter(|&&p| p == FOREGROUND).count()
    }
}
