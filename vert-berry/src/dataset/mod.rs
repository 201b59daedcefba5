//! 数据集操作.
//!
//! 采样流水线只通过 [`VolumeSource`] 获取 (扫描, 标注) 数据对,
//! 文件格式和目录结构由具体数据源负责.

use std::path::{Path, PathBuf};

use crate::{CtData3d, SampleError, SampleResult};

pub mod csi;
pub mod generic;

pub use csi::{CsiDataset, Subset};
pub use generic::GenericSource;

/// (扫描, 标注) 数据对的提供者. 按 `0..len()` 的索引取数据.
///
/// 实现者必须保证返回的扫描和标注形状一致 (通过 [`CtData3d::new`] 构建即可).
pub trait VolumeSource {
    /// 获取第 `index` 个数据对.
    fn get(&self, index: usize) -> SampleResult<CtData3d>;

    /// 数据对个数.
    fn len(&self) -> usize;

    /// 数据源是否为空.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 内存中的数据源. 每次 [`VolumeSource::get`] 都返回一份拷贝.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<CtData3d>,
}

impl MemorySource {
    /// 由已加载的数据对创建数据源.
    #[inline]
    pub fn new(data: Vec<CtData3d>) -> Self {
        Self { data }
    }

    /// 追加一个数据对.
    #[inline]
    pub fn push(&mut self, data: CtData3d) {
        self.data.push(data);
    }
}

impl FromIterator<CtData3d> for MemorySource {
    fn from_iter<I: IntoIterator<Item = CtData3d>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl VolumeSource for MemorySource {
    fn get(&self, index: usize) -> SampleResult<CtData3d> {
        self.data
            .get(index)
            .cloned()
            .ok_or(SampleError::IndexOutOfRange(index, self.data.len()))
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
