//! 样本导出为 npz, 便于离线检查.

use ndarray::{Array1, Array3, Array4, Dimension, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError, ReadableElement, WriteNpzError};
use std::fs::File;
use std::path::Path;

use super::Sample;

/// npz 中的数组名.
pub mod keys {
    /// 扫描 patch.
    pub const IMAGE: &str = "image";
    /// 先验实例 patch.
    pub const INSTANCE: &str = "instance";
    /// 真值 patch.
    pub const GROUND_TRUTH: &str = "ground_truth";
    /// 边界加权图.
    pub const WEIGHT: &str = "weight";
    /// 完整性标签.
    pub const COMPLETE: &str = "complete";
}

/// 导出/读取样本错误.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// 文件 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 写入 npz 错误.
    #[error(transparent)]
    WriteNpz(#[from] WriteNpzError),

    /// 读取 npz 错误.
    #[error(transparent)]
    ReadNpz(#[from] ReadNpzError),

    /// npz 中缺少某个数组.
    #[error("npz archive has no array named {0:?}")]
    MissingArray(&'static str),
}

/// 导出/读取样本结果.
pub type ExportResult<T> = Result<T, ExportError>;

/// 从 npz 读回的样本数组.
#[derive(Debug, Clone)]
pub struct SampleArrays {
    /// 扫描 patch, `[1, C, C, C]`.
    pub image: Array4<f32>,

    /// 先验实例 patch, `[1, C, C, C]`.
    pub instance: Array4<u8>,

    /// 真值 patch, `[1, C, C, C]`.
    pub ground_truth: Array4<u8>,

    /// 边界加权图, `[C, C, C]`.
    pub weight: Array3<f32>,

    /// 完整性标签, `[1]`.
    pub complete: Array1<u8>,
}

/// 按名字读取数组. 兼容带或不带 `.npy` 后缀的条目名.
fn read_entry<A, D>(
    npz: &mut NpzReader<File>,
    names: &[String],
    key: &'static str,
) -> ExportResult<ndarray::ArrayBase<OwnedRepr<A>, D>>
where
    A: ReadableElement,
    D: Dimension,
{
    let entry = names
        .iter()
        .find(|n| n.as_str() == key || n.strip_suffix(".npy") == Some(key))
        .ok_or(ExportError::MissingArray(key))?;
    Ok(npz.by_name::<OwnedRepr<A>, D>(entry)?)
}

impl Sample {
    /// 将样本的五个数组写入 `path` 处的 npz 文件.
    pub fn save_npz<P: AsRef<Path>>(&self, path: P) -> ExportResult<()> {
        let mut npz = NpzWriter::new(File::create(path)?);
        npz.add_array(keys::IMAGE, &self.image)?;
        npz.add_array(keys::INSTANCE, &self.instance)?;
        npz.add_array(keys::GROUND_TRUTH, &self.ground_truth)?;
        npz.add_array(keys::WEIGHT, &self.weight)?;
        npz.add_array(keys::COMPLETE, &self.complete_array())?;
        npz.finish()?;
        Ok(())
    }

    /// 读取由 [`Self::save_npz`] 写入的文件.
    pub fn load_npz<P: AsRef<Path>>(path: P) -> ExportResult<SampleArrays> {
        let mut npz = NpzReader::new(File::open(path)?)?;
        let names = npz.names()?;
        Ok(SampleArrays {
            image: read_entry(&mut npz, &names, keys::IMAGE)?,
            instance: read_entry(&mut npz, &names, keys::INSTANCE)?,
            ground_truth: read_entry(&mut npz, &names, keys::GROUND_TRUTH)?,
            weight: read_entry(&mut npz, &names, keys::WEIGHT)?,
            complete: read_entry(&mut npz, &names, keys::COMPLETE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::RegionKind;
    use crate::sample::{Augmented, Window};
    use ndarray::{Array3, Array4};

    #[test]
    fn test_save_and_load() {
        let sample = Sample {
            image: Array4::from_shape_fn((1, 4, 4, 4), |(_, z, h, w)| (z * 16 + h * 4 + w) as f32),
            instance: Array4::zeros((1, 4, 4, 4)),
            ground_truth: Array4::ones((1, 4, 4, 4)),
            weight: Array3::from_elem((4, 4, 4), 9.0),
            complete: 1,
            chosen: 3,
            region: RegionKind::Structure,
            window: Window {
                start: [0; 3],
                end: [4; 3],
            },
            ratio: 1.0,
            augmented: Augmented::default(),
        };
        let path =
            std::env::temp_dir().join(format!("vert-berry-sample-{}.npz", std::process::id()));
        sample.save_npz(&path).unwrap();
        let back = Sample::load_npz(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(back.image, sample.image);
        assert_eq!(back.instance, sample.instance);
        assert_eq!(back.ground_truth, sample.ground_truth);
        assert_eq!(back.weight, sample.weight);
        assert_eq!(back.complete.to_vec(), [1]);
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("vert-berry-no-such-sample.npz");
        assert!(matches!(Sample::load_npz(path), Err(ExportError::Io(_))));
    }
}
