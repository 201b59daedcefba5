//! 通用常量.

/// 单通道掩码取值.
pub mod gray {
    /// 标注中背景的体素值.
    pub const BACKGROUND: u8 = 0;

    /// 二值掩码中前景的体素值.
    pub const FOREGROUND: u8 = 1;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 体素是否属于某个椎骨实例?
    #[inline]
    pub const fn is_instance(p: u8) -> bool {
        !is_background(p)
    }
}

/// patch 立方体的默认边长.
pub const CUBE_SIZE: usize = 128;

/// 默认情况下, 在全图 (而不是椎骨包围盒) 中取样的概率.
pub const BACKGROUND_SAMPLE_PROB: f64 = 0.2;

/// 12-bit 重建值到 HU 的默认线性系数.
pub const LINEAR_ATT: f32 = 1.0;

/// 12-bit 重建值到 HU 的默认偏移. CSI 数据的原始取值范围是 0 ~ 4095.
pub const HU_OFFSET: f32 = 1000.0;

/// 可见体积比不小于该值时, 样本被视为 "完整".
pub const COMPLETE_THRESHOLD: f64 = 0.98;

/// 计算可见体积比时防止除零的平滑项.
pub const COMPLETE_EPS: f64 = 1e-4;

/// 每个增强步骤的默认触发概率.
pub const AUGMENT_PROB: f64 = 0.5;

/// 裁剪平移步骤的另一种触发概率 (20%), 见 [`crate::sample::AugmentConfig::with_documented_crop_prob`].
pub const DOCUMENTED_CROP_PROB: f64 = 0.2;

/// 弹性形变的默认位移尺度.
pub const ELASTIC_ALPHA: f64 = 300.0;

/// 弹性形变位移场的默认平滑尺度.
pub const ELASTIC_SIGMA: f64 = 8.0;

/// 高斯模糊标准差 (体素) 的默认取值范围, 每次模糊在其中均匀选取.
pub const BLUR_SIGMA_RANGE: (f64, f64) = (0.5, 1.5);

/// 加性高斯噪声的默认标准差 (HU).
pub const NOISE_STD: f64 = 20.0;

/// 高斯核截断半径与标准差之比.
pub const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// 边界加权图的默认参数.
pub mod weight {
    /// 基础权重.
    pub const ALPHA: f32 = 1.0;

    /// 边界处额外增加的权重.
    pub const BETA: f32 = 8.0;

    /// 权重随距离衰减的尺度 (体素).
    pub const OMEGA: f32 = 6.0;
}

/// 区域取样方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegionKind {
    /// 在整幅扫描中随机取样.
    Background,

    /// 在被选中椎骨的包围盒中随机取样.
    Structure,
}

impl RegionKind {
    /// 是否为全图取样.
    #[inline]
    pub fn is_background(&self) -> bool {
        matches!(self, Self::Background)
    }
}
