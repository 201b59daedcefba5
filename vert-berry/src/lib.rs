#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 从整幅脊柱 CT 扫描及其椎骨实例标注中, 随机生成用于迭代式
//! 实例分割网络训练的定长 3D 样本.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 假设标注按照 CSI 2014 脊柱数据集的惯例组织: 0 为背景,
//!   每个正整数代表一节椎骨, 且编号越小的椎骨被视为 "已分割" 的先验.
//! 2. 每次采样都会重新计算全部中间结果, 不做任何缓存.
//!   同一索引的多次采样在随机数发生器不同时结果不同.
//!
//! # 开发计划
//!
//! ### 椎骨实例选择 ✅
//!
//! 从标注中均匀随机选取一节椎骨, 生成 "先验实例" 掩码与真值掩码.
//!
//! 实现位于 `vert-berry/src/sample/instance.rs`.
//!
//! ### 随机 patch 裁剪与填充 ✅
//!
//! 按一定概率在全图或椎骨包围盒内随机取中心, 裁剪后以原图最小值填充至定长立方体.
//!
//! 实现位于 `vert-berry/src/sample/patch.rs`.
//!
//! ### 数据增强编排 ✅
//!
//! 弹性形变, 高斯模糊, 高斯噪声和沿 z 方向的裁剪平移. 具体算子通过
//! [`sample::VolumeTransform`] 注入, 默认实现位于 `vert-berry/src/sample/kernel.rs`.
//!
//! ### 完整性标签 ✅
//!
//! 判断 patch 是否包含 (几乎) 整节椎骨.
//!
//! ### 边界加权图 ✅
//!
//! 基于精确欧氏距离变换 (可分离的下包络算法) 计算到前景/背景边界的距离,
//! 再映射为损失权重.
//!
//! 实现位于 `vert-berry/src/sample/{edt, weight}.rs`.
//!
//! ### 数据集加载 ✅
//!
//! nifti 扫描/标注读取, CSI 目录结构适配, 以及内存数据源.
//!
//! ### 小功能 ✅
//!
//! 1. 样本导出为 npz, 便于可视化检查. ✅
//! 2. `rayon` 并行版本的边界加权图. ✅

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 3D CT nii 文件基础数据结构.
mod data;

mod error;

pub use data::{CtData3d, CtLabel, CtScan, HuRescale};

pub use error::{SampleError, SampleResult};

pub mod consts;

pub mod dataset;
pub mod prelude;
pub mod sample;
