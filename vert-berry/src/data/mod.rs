use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayD, ArrayView, Ix3};
use nifti::{InMemNiftiObject, IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use ordered_float::OrderedFloat;

use crate::consts::gray::*;
use crate::{Idx3d, SampleError, SampleResult};

mod rescale;

pub use rescale::HuRescale;

/// 从 header 中读取体素分辨率, 并将 (W, H, z) 转换成 (z, H, W).
#[inline]
fn get_pix_dim_from_header(h: &NiftiHeader) -> [f64; 3] {
    let [_, w, h, z, ..] = h.pixdim;
    [z as f64, h as f64, w as f64]
}

/// 打开 nifti 文件并检查其为三维体数据. 同时返回 `[z, h, w]` 顺序的体素分辨率.
fn open_volume(path: &Path) -> SampleResult<(InMemNiftiObject, [f64; 3])> {
    let obj = ReaderOptions::new().read_file(path)?;
    let dim = obj.header().dim[0];
    if dim != 3 {
        return Err(SampleError::NotVolume(dim));
    }
    let pix_dim = get_pix_dim_from_header(obj.header());
    Ok((obj, pix_dim))
}

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
fn to_zhw<T: Clone>(data: ArrayD<T>) -> SampleResult<Array3<T>> {
    let ndim = data.ndim() as u16;
    // hint: 原第一维向下增长, 原第二维向右增长.
    let data = data
        .permuted_axes([2, 1, 0].as_slice())
        .into_dimensionality::<Ix3>()
        .map_err(|_| SampleError::NotVolume(ndim))?;

    // The nature of nifti data field layout: 转置后通常已是标准布局.
    Ok(if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    })
}

/// 将形状转换为索引元组.
#[inline]
fn shape_of<T>(data: &Array3<T>) -> Idx3d {
    data.dim()
}

/// 3D CT 扫描, HU 值以 `f32` 保存. 数据按 `[z, h, w]` 组织.
#[derive(Debug, Clone)]
pub struct CtScan {
    data: Array3<f32>,
    pix_dim: [f64; 3],
}

impl Index<Idx3d> for CtScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtScan {
    /// 打开 nii 文件格式的 3D CT 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    ///
    /// 读取时不做任何灰度变换, 需要的话请调用 [`Self::rescale`].
    pub fn open<P: AsRef<Path>>(path: P) -> SampleResult<Self> {
        let (obj, pix_dim) = open_volume(path.as_ref())?;
        let data = to_zhw(obj.into_volume().into_ndarray::<f32>()?)?;
        Ok(Self { data, pix_dim })
    }

    /// 根据 `[z, h, w]` 组织的裸数据直接创建扫描. 体素分辨率视为各向同性的 1 毫米.
    #[inline]
    pub fn from_array(data: Array3<f32>) -> Self {
        Self {
            data,
            pix_dim: [1.0; 3],
        }
    }

    /// 获取数据形状大小, `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        shape_of(&self.data)
    }

    /// 获取单个体素分辨率, 以毫米为单位, 顺序为 `[z, h, w]`.
    #[inline]
    pub fn pix_dim(&self) -> [f64; 3] {
        self.pix_dim
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.pix_dim;
        z == h && z == w
    }

    /// 对所有体素就地应用线性变换 `rescale`.
    pub fn rescale(&mut self, rescale: HuRescale) {
        if !rescale.is_identity() {
            self.data.mapv_inplace(|v| rescale.eval(v));
        }
    }

    /// 整个扫描的最小 HU 值. NaN 被忽略; 若扫描为空则返回 `None`.
    pub fn min_hu(&self) -> Option<f32> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .copied()
            .map(OrderedFloat)
            .min()
            .map(|m| m.0)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }
}

/// 3D CT 椎骨实例标注. 标签值以 `u8` 保存, 0 为背景, 每个正整数代表一节椎骨.
#[derive(Debug, Clone)]
pub struct CtLabel {
    data: Array3<u8>,
    pix_dim: [f64; 3],
}

impl Index<Idx3d> for CtLabel {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtLabel {
    /// 打开 nii 文件格式的 3D CT 标注. `path` 为 nii 文件的本地路径. 如果打开成功,
    /// 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> SampleResult<Self> {
        let (obj, pix_dim) = open_volume(path.as_ref())?;
        // 先以宽整数读取, 避免 `u8` 转换时静默回绕.
        let raw = obj.into_volume().into_ndarray::<i64>()?;
        if let Some(&bad) = raw.iter().find(|&&v| u8::try_from(v).is_err()) {
            return Err(SampleError::LabelOutOfRange(bad));
        }
        let data = to_zhw(raw.mapv(|v| v as u8))?;
        Ok(Self { data, pix_dim })
    }

    /// 根据 `[z, h, w]` 组织的裸标签数据直接创建标注. 体素分辨率视为各向同性的 1 毫米.
    #[inline]
    pub fn from_array(data: Array3<u8>) -> Self {
        Self {
            data,
            pix_dim: [1.0; 3],
        }
    }

    /// 获取数据形状大小, `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        shape_of(&self.data)
    }

    /// 获取单个体素分辨率, 以毫米为单位, 顺序为 `[z, h, w]`.
    #[inline]
    pub fn pix_dim(&self) -> [f64; 3] {
        self.pix_dim
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获取 3D 标注中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 标注中是否存在至少一个椎骨体素?
    #[inline]
    pub fn has_instance(&self) -> bool {
        self.data.iter().any(|&p| is_instance(p))
    }

    /// 收集值为 `label` 的所有体素对应的下标. 结果按行优先存储.
    pub fn label_pos(&self, label: u8) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, pixel)| (*pixel == label).then_some(pos))
            .collect()
    }
}

/// nii 格式的 3D CT 扫描与对应的标注.
///
/// 该结构完全透明, 仅包含两个公开的 `scan` 和 `label` 子结构.
/// 通过 [`Self::new`] 或 [`Self::open`] 创建时保证两者形状一致.
#[derive(Debug, Clone)]
pub struct CtData3d {
    /// 3D CT 扫描.
    pub scan: CtScan,

    /// 3D CT 标注.
    pub label: CtLabel,
}

impl CtData3d {
    /// 组合扫描和标注. 若两者形状不一致, 则返回 [`SampleError::ShapeMismatch`].
    pub fn new(scan: CtScan, label: CtLabel) -> SampleResult<Self> {
        if scan.shape() != label.shape() {
            return Err(SampleError::ShapeMismatch {
                scan: scan.shape(),
                label: label.shape(),
            });
        }
        Ok(Self { scan, label })
    }

    /// 由裸数据直接组合扫描和标注, 形状检查同 [`Self::new`].
    #[inline]
    pub fn from_arrays(scan: Array3<f32>, label: Array3<u8>) -> SampleResult<Self> {
        Self::new(CtScan::from_array(scan), CtLabel::from_array(label))
    }

    /// 分别打开 nii 文件格式的 3D CT 扫描和对应标注. 如果任一文件打开失败,
    /// 或者两个文件的数据形状不一致, 则返回 `Err`.
    pub fn open(scan_path: impl AsRef<Path>, label_path: impl AsRef<Path>) -> SampleResult<Self> {
        let scan = CtScan::open(scan_path.as_ref())?;
        let label = CtLabel::open(label_path.as_ref())?;
        Self::new(scan, label)
    }

    /// 获取数据形状大小, `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.label.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3};

    #[test]
    fn test_shape_mismatch() {
        let err = CtData3d::from_arrays(Array3::zeros((4, 5, 6)), Array3::zeros((4, 5, 7)))
            .unwrap_err();
        match err {
            SampleError::ShapeMismatch { scan, label } => {
                assert_eq!(scan, (4, 5, 6));
                assert_eq!(label, (4, 5, 7));
            }
            e => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_scan_rescale_and_min() {
        let mut raw = Array3::from_elem((3, 3, 3), 1500.0f32);
        raw[(1, 1, 1)] = 200.0;
        raw[(2, 2, 2)] = f32::NAN;
        let mut scan = CtScan::from_array(raw);
        scan.rescale(HuRescale::default());
        assert_eq!(scan[(0, 0, 0)], 500.0);
        assert_eq!(scan.min_hu(), Some(-800.0));
        assert!(scan.is_isotropic());
    }

    #[test]
    fn test_label_statistics() {
        let mut raw = Array3::<u8>::zeros((6, 6, 6));
        raw.slice_mut(s![1..3, 1..3, 1..3]).fill(2);
        raw[(5, 5, 5)] = 1;
        let label = CtLabel::from_array(raw);
        assert!(label.has_instance());
        assert_eq!(label.count(2), 8);
        assert_eq!(label.label_pos(1), vec![(5, 5, 5)]);
        assert!(!CtLabel::from_array(Array3::zeros((2, 2, 2))).has_instance());
    }

    /// 将 `i16` 标注写入临时 nii 文件后用 [`CtLabel::open`] 读回.
    fn open_i16(name: &str, raw: &Array3<i16>) -> SampleResult<CtLabel> {
        let file = format!("vert-berry-{}-{name}.nii", std::process::id());
        let path = std::env::temp_dir().join(file);
        nifti::writer::WriterOptions::new(&path).write_nifti(raw).unwrap();
        let label = CtLabel::open(&path);
        let _ = std::fs::remove_file(&path);
        label
    }

    #[test]
    fn test_open_wide_labels() {
        let mut raw = Array3::<i16>::zeros((3, 4, 5));
        raw[(0, 0, 0)] = 7;
        raw[(1, 2, 3)] = 25;
        raw[(2, 3, 4)] = 255;
        let label = open_i16("in-range", &raw).unwrap();
        assert_eq!(label.shape(), (5, 4, 3));
        assert_eq!(label.count(7), 1);
        assert_eq!(label.count(25), 1);
        assert_eq!(label.count(255), 1);
        assert_eq!(label.count(0), 60 - 3);

        // 300 和 256 不能被截断成其他椎骨或背景.
        let mut raw = Array3::<i16>::zeros((4, 4, 4));
        raw[(0, 0, 0)] = 300;
        raw[(1, 1, 1)] = 44;
        raw[(2, 2, 2)] = 256;
        match open_i16("too-large", &raw) {
            Err(SampleError::LabelOutOfRange(v)) => assert!(v == 300 || v == 256),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut raw = Array3::<i16>::zeros((2, 2, 2));
        raw[(1, 0, 1)] = -3;
        assert!(matches!(
            open_i16("negative", &raw),
            Err(SampleError::LabelOutOfRange(-3))
        ));
    }
}
