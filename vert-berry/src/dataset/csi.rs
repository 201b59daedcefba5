//! MICCAI 2014 脊柱分割挑战赛 (CSI) 数据集加载器.
//!
//! 目录结构约定如下:
//!
//! ```text
//! {root}/
//!   train/
//!     img/  case01.nii.gz, ...
//!     seg/  case01_label.nii.gz, ...
//!   test/
//!     img/
//!     seg/
//! ```
//!
//! 标注文件名由扫描文件名的主干加 `_label` 后缀得到, 扩展名保持不变.

use super::VolumeSource;
use crate::{CtData3d, HuRescale, SampleError, SampleResult};
use std::fs;
use std::path::{Path, PathBuf};

/// 支持的 nifti 扩展名. 长的在前, 以便 `.nii.gz` 优先匹配.
const NIFTI_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// 数据子集.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subset {
    /// 训练集.
    Train,

    /// 测试集.
    Test,
}

impl Subset {
    /// 子集对应的目录名.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

/// 把文件名拆成 (主干, nifti 扩展名). 不是 nifti 文件时返回 `None`.
fn split_nifti_name(name: &str) -> Option<(&str, &str)> {
    NIFTI_EXTENSIONS.iter().find_map(|ext| {
        name.strip_suffix(ext)
            .filter(|stem| !stem.is_empty())
            .map(|stem| (stem, *ext))
    })
}

/// 由扫描文件名得到标注文件名. 例如 `case01.nii.gz` -> `case01_label.nii.gz`.
pub fn label_name_of(scan_name: &str) -> Option<String> {
    let (stem, ext) = split_nifti_name(scan_name)?;
    Some(format!("{stem}_label{ext}"))
}

/// CSI 数据集的一个子集. 第 `i` 个数据对由扫描文件名按字典序排序后的第 `i` 个决定.
#[derive(Debug, Clone)]
pub struct CsiDataset {
    img_path: PathBuf,
    seg_path: PathBuf,
    names: Vec<String>,
    rescale: HuRescale,
}

impl CsiDataset {
    /// 打开 `root` 下的 `subset` 子集. 扫描在读取后会应用 `rescale`.
    ///
    /// 只扫描 `img` 目录并记录文件名, 不读取任何体数据.
    /// 若 `img` 或 `seg` 目录不存在, 则返回 `Err`.
    pub fn open<P: AsRef<Path>>(root: P, subset: Subset, rescale: HuRescale) -> SampleResult<Self> {
        let base = root.as_ref().join(subset.as_str());
        let img_path = base.join("img");
        let seg_path = base.join("seg");
        if !seg_path.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", seg_path.display()),
            )
            .into());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&img_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if split_nifti_name(name).is_some() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort_unstable();
        log::debug!(
            "CSI {} subset: {} scans under {}",
            subset.as_str(),
            names.len(),
            img_path.display()
        );

        Ok(Self {
            img_path,
            seg_path,
            names,
            rescale,
        })
    }

    /// 所有扫描文件名, 按字典序排列.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 第 `index` 个数据对的 (扫描, 标注) 文件路径.
    pub fn paths(&self, index: usize) -> Option<(PathBuf, PathBuf)> {
        let name = self.names.get(index)?;
        let label = label_name_of(name)?;
        Some((self.img_path.join(name), self.seg_path.join(label)))
    }
}

impl VolumeSource for CsiDataset {
    fn get(&self, index: usize) -> SampleResult<CtData3d> {
        let (scan_path, label_path) = self
            .paths(index)
            .ok_or(SampleError::IndexOutOfRange(index, self.names.len()))?;
        let mut data = CtData3d::open(scan_path, label_path)?;

        // 从 12-bit 重建值线性变换到 HU.
        data.scan.rescale(self.rescale);
        if !data.label.has_instance() {
            log::warn!("{} has no labelled vertebra", self.names[index]);
        }
        Ok(data)
    }

    #[inline]
    fn len(&self) -> usize {
        self.names.len()
    }
}
