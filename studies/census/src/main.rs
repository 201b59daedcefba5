//! 在 CSI 训练集上批量采样, 统计区域/完整性/增强的实际分布和耗时.
//!
//! 数据集根目录取 `$CSI_DATASET_DIR`, 否则为 `$HOME/dataset/csi`.

mod profile;
mod result;
mod runner;

use simple_logger::SimpleLogger;

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .expect("Logger initialization error");

    match runner::run() {
        Ok(r) => {
            if let Err(e) = r.analyze() {
                log::error!("failed to print result: {e}");
            }
            log::info!("{} samples in total", r.total().get_samples());
        }
        Err(e) => {
            log::error!("census aborted: {e}");
            std::process::exit(1);
        }
    }
}
