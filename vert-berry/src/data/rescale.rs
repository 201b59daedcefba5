use crate::consts::{HU_OFFSET, LINEAR_ATT};

/// 重建值到 HU 的线性变换, `v' = v * linear_att - offset`.
///
/// 该变换是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HuRescale {
    linear_att: f32,
    offset: f32,
}

impl Default for HuRescale {
    /// CSI 数据 (取值 0 ~ 4095) 的默认变换: 系数 1.0, 偏移 1000.0.
    #[inline]
    fn default() -> Self {
        Self {
            linear_att: LINEAR_ATT,
            offset: HU_OFFSET,
        }
    }
}

impl HuRescale {
    /// 构建线性变换.
    ///
    /// `linear_att` 和 `offset` 必须是有限值, 且 `linear_att` 不为 0, 否则返回 `None`.
    pub fn new(linear_att: f32, offset: f32) -> Option<HuRescale> {
        if linear_att.is_finite() && linear_att != 0.0 && offset.is_finite() {
            Some(Self { linear_att, offset })
        } else {
            None
        }
    }

    /// 恒等变换.
    #[inline]
    pub const fn identity() -> HuRescale {
        Self {
            linear_att: 1.0,
            offset: 0.0,
        }
    }

    /// 线性系数.
    #[inline]
    pub fn linear_att(&self) -> f32 {
        self.linear_att
    }

    /// 偏移.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// 是否为恒等变换.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.linear_att == 1.0 && self.offset == 0.0
    }

    /// 求 `v` 经过变换后的值.
    #[inline]
    pub fn eval(&self, v: f32) -> f32 {
        v * self.linear_att - self.offset
    }
}

#[cfg(test)]
mod tests {
    use crate::HuRescale;

    fn float_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_rescale_invalid_input() {
        assert!(HuRescale::new(0.0, 0.0).is_none());
        assert!(HuRescale::new(f32::NAN, 0.0).is_none());
        assert!(HuRescale::new(1.0, f32::INFINITY).is_none());
        assert!(HuRescale::new(2.0, -3.0).is_some());
    }

    #[test]
    fn test_rescale_default() {
        let r = HuRescale::default();
        assert!(float_eq(r.eval(0.0), -1000.0));
        assert!(float_eq(r.eval(1000.0), 0.0));
        assert!(float_eq(r.eval(4095.0), 3095.0));
        assert!(!r.is_identity());
    }

    #[test]
    fn test_rescale_generic() {
        let r = HuRescale::new(0.5, 10.0).unwrap();
        assert!(float_eq(r.eval(100.0), 40.0));
        assert!(HuRescale::identity().is_identity());
        assert!(float_eq(HuRescale::identity().eval(-7.5), -7.5));
    }
}
