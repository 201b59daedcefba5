//! 通用 CT scan/label 数据加载器.
//!
//! 提供索引访问和迭代器两种风格的数据集获取模式.

use super::VolumeSource;
use crate::{CtData3d, HuRescale, SampleError, SampleResult};
use std::path::{Path, PathBuf};

/// 文件名构造器. 接受数据集索引数, 获得文件名.
pub type FilenameBuilder = fn(u32) -> String;

/// 由文件名构造器描述的数据集. 第 `i` 个数据对为
/// `scan_path/scan_builder(ids[i])` 和 `label_path/label_builder(ids[i])`.
///
/// 扫描在读取后会应用 `rescale`.
#[derive(Debug, Clone)]
pub struct GenericSource {
    scan_path: PathBuf,
    scan_builder: FilenameBuilder,
    label_path: PathBuf,
    label_builder: FilenameBuilder,
    ids: Vec<u32>,
    rescale: HuRescale,
}

impl GenericSource {
    /// 从指定索引、路径、文件名构造器来创建数据源.
    ///
    /// # 注意
    ///
    /// `scan_path` 和 `label_path` 必须是目录, 否则返回 `Err`.
    /// 文件本身是否存在要到 [`VolumeSource::get`] 时才会检查.
    pub fn new<I: IntoIterator<Item = u32>, P: AsRef<Path>>(
        ids: I,
        scan_path: P,
        scan_builder: FilenameBuilder,
        label_path: P,
        label_builder: FilenameBuilder,
    ) -> SampleResult<Self> {
        let scan_path = scan_path.as_ref().to_owned();
        let label_path = label_path.as_ref().to_owned();
        for p in [&scan_path, &label_path] {
            if !p.is_dir() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} is not a directory", p.display()),
                )
                .into());
            }
        }
        Ok(Self {
            scan_path,
            scan_builder,
            label_path,
            label_builder,
            ids: ids.into_iter().collect(),
            rescale: HuRescale::default(),
        })
    }

    /// 替换读取扫描后使用的线性变换.
    #[inline]
    pub fn with_rescale(mut self, rescale: HuRescale) -> Self {
        self.rescale = rescale;
        self
    }

    /// 第 `index` 个数据对的 (扫描, 标注) 文件路径.
    pub fn paths(&self, index: usize) -> Option<(PathBuf, PathBuf)> {
        let id = *self.ids.get(index)?;
        Some((
            self.scan_path.join((self.scan_builder)(id)),
            self.label_path.join((self.label_builder)(id)),
        ))
    }

    /// 获取能按索引序迭代所有数据对的迭代器. 迭代项为 `(数据集编号, 数据)`.
    pub fn iter(&self) -> CtDataLoader<'_> {
        CtDataLoader {
            source: self,
            cursor: 0,
        }
    }
}

impl VolumeSource for GenericSource {
    fn get(&self, index: usize) -> SampleResult<CtData3d> {
        let (scan_path, label_path) = self
            .paths(index)
            .ok_or(SampleError::IndexOutOfRange(index, self.ids.len()))?;
        let mut data = CtData3d::open(scan_path, label_path)?;
        data.scan.rescale(self.rescale);
        Ok(data)
    }

    #[inline]
    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// 3D CT 数据集 (scan + label) 加载器, 并在内部自动转换文件名.
#[derive(Debug)]
pub struct CtDataLoader<'a> {
    source: &'a GenericSource,
    cursor: usize,
}

impl Iterator for CtDataLoader<'_> {
    type Item = (u32, SampleResult<CtData3d>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = *self.source.ids.get(self.cursor)?;
        let data = self.source.get(self.cursor);
        self.cursor += 1;
        Some((id, data))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.source.ids.len() - self.cursor;
        (n, Some(n))
    }
}

impl ExactSizeIterator for CtDataLoader<'_> {}
