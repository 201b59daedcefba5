//! 对 `vert-berry::dataset` 的更一层封装. 提供更直接的数据集加载器.

use std::env;
use std::path::{Path, PathBuf};
use vert_berry::dataset::{self, CsiDataset, Subset};
use vert_berry::{HuRescale, SampleResult};

/// 获取 CSI 数据集根目录.
///
/// 1. 若环境变量 `$CSI_DATASET_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/csi`.
///
/// 两者都无法确定时返回 `None`.
pub fn csi_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("CSI_DATASET_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["csi"]),
    }
}

/// 打开 `root` 下的 CSI 子集, 使用默认的 HU 变换.
pub fn csi_subset<P: AsRef<Path>>(root: P, subset: Subset) -> SampleResult<CsiDataset> {
    CsiDataset::open(root, subset, HuRescale::default())
}

/// 从 `$CSI_DATASET_DIR` 或者 `$HOME/dataset/csi` 下打开 CSI 训练集.
pub fn csi_train_from_env_or_home() -> SampleResult<CsiDataset> {
    let root = csi_dir_from_env_or_home().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "neither $CSI_DATASET_DIR nor the home directory is available",
        )
    })?;
    csi_subset(root, Subset::Train)
}
