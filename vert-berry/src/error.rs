//! 运行时错误.

use crate::Idx3d;

/// 采样流水线的运行时错误.
///
/// 所有错误都直接交给调用方处理, 库内部不做任何重试.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// 标注中不存在任何正标签 (只有背景).
    #[error("label volume contains no positive instance")]
    EmptyMask,

    /// CT 扫描和标注形状不一致.
    #[error("scan shape {scan:?} does not match label shape {label:?}")]
    ShapeMismatch {
        /// 扫描形状, `(z, h, w)`.
        scan: Idx3d,

        /// 标注形状, `(z, h, w)`.
        label: Idx3d,
    },

    /// nifti 文件不是三维体数据. 参数为文件头中记录的维数.
    #[error("expected a 3-dimensional volume, found {0} dimensions")]
    NotVolume(u16),

    /// 标注中出现了负值或超过 255 的标签值. 参数为第一个出错的值.
    #[error("label value {0} is outside the supported range 0..=255")]
    LabelOutOfRange(i64),

    /// 数据源中不存在该索引. `(index, len)`.
    #[error("sample index {0} out of range for a source of length {1}")]
    IndexOutOfRange(usize, usize),

    /// 配置参数不合法. 参数为出错字段的描述.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// 读取 nifti 文件错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 其他底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 采样流水线运行时结果.
pub type SampleResult<T> = Result<T, SampleError>;
