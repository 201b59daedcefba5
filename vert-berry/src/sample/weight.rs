//! 边界加权图.
//!
//! 离前景/背景分界面越近的体素, 在损失函数中的权重越高:
//!
//! ```text
//! w = alpha + beta * exp(-d^2 / omega^2)
//! ```
//!
//! 其中 `d` 为体素到分界面的距离, 即它到最近背景体素与到最近前景体素的
//! 欧氏距离之和. 两者之一总是 0.

use ndarray::{Array3, ArrayView3};

use super::edt::distance_to;
use crate::consts::weight::{ALPHA, BETA, OMEGA};

/// 体素到前景/背景分界面的距离.
///
/// 若掩码中只有一类体素, 则不存在分界面, 所有距离为 `INFINITY`.
pub fn distance_to_border(mask: ArrayView3<u8>) -> Array3<f64> {
    let fg = mask.mapv(|p| p > 0);
    let bg = mask.mapv(|p| p == 0);
    distance_to(bg.view()) + distance_to(fg.view())
}

/// 加权函数的参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightSpec {
    alpha: f32,
    beta: f32,
    omega: f32,
}

impl Default for WeightSpec {
    fn default() -> Self {
        Self {
            alpha: ALPHA,
            beta: BETA,
            omega: OMEGA,
        }
    }
}

impl WeightSpec {
    /// 创建加权参数. `omega` 必须为正, 三者都必须有限, 否则返回 `None`.
    pub fn new(alpha: f32, beta: f32, omega: f32) -> Option<Self> {
        let spec = Self { alpha, beta, omega };
        spec.is_valid().then_some(spec)
    }

    /// 参数是否合法. 反序列化得到的参数不经过 [`Self::new`], 使用前需要检查.
    #[inline]
    pub fn is_valid(&self) -> bool {
        let Self { alpha, beta, omega } = *self;
        alpha.is_finite() && beta.is_finite() && omega.is_finite() && omega > 0.0
    }

    /// 基础权重.
    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// 边界处的额外权重.
    #[inline]
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// 衰减尺度.
    #[inline]
    pub fn omega(&self) -> f32 {
        self.omega
    }

    /// 距离为 `d` 的体素的权重. `d = 0` 时为 `alpha + beta`, `d -> ∞` 时趋于 `alpha`.
    #[inline]
    pub fn weight_of(&self, d: f64) -> f32 {
        let omega = self.omega as f64;
        (self.alpha as f64 + self.beta as f64 * (-(d * d) / (omega * omega)).exp()) as f32
    }

    /// 计算 `mask` 的加权图, 形状与 `mask` 相同.
    pub fn weight_map(&self, mask: ArrayView3<u8>) -> Array3<f32> {
        distance_to_border(mask).mapv(|d| self.weight_of(d))
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use super::edt::par_distance_to;
        use ndarray::Zip;

        /// [`distance_to_border`] 的并行版本.
        pub fn par_distance_to_border(mask: ArrayView3<u8>) -> Array3<f64> {
            let fg = mask.mapv(|p| p > 0);
            let bg = mask.mapv(|p| p == 0);
            let (a, b) = rayon::join(|| par_distance_to(bg.view()), || par_distance_to(fg.view()));
            a + b
        }

        impl WeightSpec {
            /// [`Self::weight_map`] 的并行版本, 结果完全相同.
            pub fn par_weight_map(&self, mask: ArrayView3<u8>) -> Array3<f32> {
                let d = par_distance_to_border(mask);
                let mut out = Array3::zeros(d.dim());
                Zip::from(&mut out)
                    .and(&d)
                    .par_for_each(|w, &d| *w = self.weight_of(d));
                out
            }
        }
    }
}
