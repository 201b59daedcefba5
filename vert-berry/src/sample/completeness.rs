//! 完整性标签: patch 中是否包含 (几乎) 整节椎骨.

use ndarray::ArrayView3;

use crate::consts::{gray::FOREGROUND, COMPLETE_EPS, COMPLETE_THRESHOLD};

/// 掩码中前景体素的个数.
#[inline]
pub fn foreground_count(mask: ArrayView3<u8>) -> usize {
    mask.iter().filter(|&&p| p == FOREGROUND).count()
}

/// 可见体积比 `patch_count / (full_count + 1e-4)`.
#[inline]
pub fn completeness_ratio(patch_count: usize, full_count: usize) -> f64 {
    patch_count as f64 / (full_count as f64 + COMPLETE_EPS)
}

/// 完整性判定结果.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Completeness {
    /// 可见体积比.
    pub ratio: f64,

    /// 0 或 1. 1 表示完整.
    pub label: u8,
}

impl Completeness {
    /// 比较最终的真值 patch 与裁剪前的完整真值掩码.
    ///
    /// `full_count` 必须是 **裁剪前** 完整真值掩码的前景体素数,
    /// `patch` 必须是 **增强之后** 的真值 patch.
    pub fn evaluate(patch: ArrayView3<u8>, full_count: usize, threshold: f64) -> Self {
        let ratio = completeness_ratio(foreground_count(patch), full_count);
        Self {
            ratio,
            label: (ratio >= threshold) as u8,
        }
    }

    /// 使用默认阈值 0.98.
    #[inline]
    pub fn evaluate_default(patch: ArrayView3<u8>, full_count: usize) -> Self {
        Self::evaluate(patch, full_count, COMPLETE_THRESHOLD)
    }

    /// 是否完整.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.label == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3};

    #[test]
    fn test_ratio() {
        assert!(completeness_ratio(1000, 1000) < 1.0);
        assert!(completeness_ratio(1000, 1000) > 0.9999);
        assert_eq!(completeness_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_threshold() {
        let mut patch = Array3::<u8>::zeros((10, 10, 10));
        patch.slice_mut(s![..9, .., ..]).fill(1);

        // 900 / 900: 完整.
        let c = Completeness::evaluate_default(patch.view(), 900);
        assert!(c.is_complete());

        // 900 / 918 = 0.9804: 完整.
        assert_eq!(Completeness::evaluate_default(patch.view(), 918).label, 1);

        // 900 / 919 = 0.9793: 不完整.
        let c = Completeness::evaluate_default(patch.view(), 919);
        assert_eq!(c.label, 0);
        assert!(c.ratio < 0.98);

        // 非 1 的取值不计入前景.
        patch.fill(2);
        assert_eq!(foreground_count(patch.view()), 0);
    }

    /// 全空的 patch 总是不完整的, 即使完整掩码也为空.
    #[test]
    fn test_empty() {
        let patch = Array3::<u8>::zeros((4, 4, 4));
        assert_eq!(Completeness::evaluate_default(patch.view(), 0).label, 0);
        assert_eq!(Completeness::evaluate(patch.view(), 0, 0.0).label, 1);
    }
}
