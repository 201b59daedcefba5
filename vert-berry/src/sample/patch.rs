//! 随机 patch 的取样区域选择, 裁剪与填充.
//!
//! 所有区间均为左闭右开, 以 `[z, h, w]` 顺序给出.

use ndarray::{s, Array3, ArrayView3};
use rand::Rng;

use super::InstanceMasks;
use crate::consts::{RegionKind, BACKGROUND_SAMPLE_PROB, CUBE_SIZE};
use crate::{CtScan, Idx3d, SampleError, SampleResult};

/// 三个轴上的填充宽度, 每项为 (低端, 高端).
pub type PadWidths = [(usize, usize); 3];

/// patch 采样配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplerConfig {
    /// 输出立方体边长.
    pub cube_size: usize,

    /// 在整幅扫描 (而不是椎骨包围盒) 中取样的概率.
    pub background_prob: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cube_size: CUBE_SIZE,
            background_prob: BACKGROUND_SAMPLE_PROB,
        }
    }
}

impl SamplerConfig {
    /// 检查配置是否合法.
    pub fn validate(&self) -> SampleResult<()> {
        if self.cube_size == 0 {
            return Err(SampleError::InvalidConfig("cube_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.background_prob) {
            return Err(SampleError::InvalidConfig(
                "background_prob must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// 取样区域. 中心点在该区域内均匀选取, 裁剪窗口也不会超出该区域.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    /// 区域来源.
    pub kind: RegionKind,

    /// 各轴下界 (含).
    pub lower: [usize; 3],

    /// 各轴上界 (不含).
    pub upper: [usize; 3],
}

impl Region {
    /// 整幅扫描.
    #[inline]
    pub fn full((z, h, w): Idx3d) -> Self {
        Self {
            kind: RegionKind::Background,
            lower: [0; 3],
            upper: [z, h, w],
        }
    }

    /// `mask` 中所有非零体素的最小包围盒. 不存在非零体素时返回 `None`.
    pub fn bounding_box(mask: ArrayView3<u8>) -> Option<Self> {
        let mut lower = [usize::MAX; 3];
        let mut upper = [0usize; 3];
        let mut found = false;
        for ((z, h, w), &p) in mask.indexed_iter() {
            if p == 0 {
                continue;
            }
            found = true;
            for (axis, v) in [z, h, w].into_iter().enumerate() {
                lower[axis] = lower[axis].min(v);
                upper[axis] = upper[axis].max(v + 1);
            }
        }
        found.then_some(Self {
            kind: RegionKind::Structure,
            lower,
            upper,
        })
    }

    /// 区域是否覆盖形状为 `shape` 的整幅数据.
    #[inline]
    pub fn is_full(&self, (z, h, w): Idx3d) -> bool {
        self.lower == [0; 3] && self.upper == [z, h, w]
    }

    /// 各轴长度.
    #[inline]
    pub fn extent(&self) -> [usize; 3] {
        [0, 1, 2].map(|a| self.upper[a] - self.lower[a])
    }

    /// 在区域内各轴独立均匀地选取中心点.
    pub fn draw_center<R: Rng + ?Sized>(&self, rng: &mut R) -> [usize; 3] {
        debug_assert!(self.extent().iter().all(|&e| e > 0));
        [0, 1, 2].map(|a| rng.gen_range(self.lower[a]..self.upper[a]))
    }

    /// 以 `center` 为中心、边长 `cube_size` 的窗口与本区域的交.
    ///
    /// 每个轴上窗口为 `[center - cube_size / 2, center + cube_size / 2)`
    /// 截断到区域内, 因此长度在 `1..=cube_size` 之间.
    pub fn window(&self, center: [usize; 3], cube_size: usize) -> Window {
        let half = cube_size / 2;
        let start = [0, 1, 2].map(|a| center[a].saturating_sub(half).max(self.lower[a]));
        let end = [0, 1, 2].map(|a| (center[a] + half).min(self.upper[a]));
        let end = [0, 1, 2].map(|a| end[a].max(start[a] + 1));
        Window { start, end }
    }
}

/// 裁剪窗口, 左闭右开.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Window {
    /// 各轴起点 (含).
    pub start: [usize; 3],

    /// 各轴终点 (不含).
    pub end: [usize; 3],
}

impl Window {
    /// 各轴长度.
    #[inline]
    pub fn extent(&self) -> [usize; 3] {
        [0, 1, 2].map(|a| self.end[a] - self.start[a])
    }

    /// 从 `data` 中取出窗口对应的子数组视图.
    pub fn view<'a, T>(&self, data: ArrayView3<'a, T>) -> ArrayView3<'a, T> {
        let ([z0, h0, w0], [z1, h1, w1]) = (self.start, self.end);
        data.slice_move(s![z0..z1, h0..h1, w0..w1])
    }
}

/// 将长度为 `extent` 的轴填充到 `cube_size` 时两端的填充宽度.
///
/// 差值为偶数时两端平分; 为奇数时低端取较小的一半, 高端多 1.
/// 要求 `extent <= cube_size`.
#[inline]
pub fn pad_widths(extent: usize, cube_size: usize) -> (usize, usize) {
    debug_assert!(extent <= cube_size);
    let deficit = cube_size.saturating_sub(extent);
    let low = deficit / 2;
    (low, deficit - low)
}

/// 用 `fill` 将 `patch` 各轴居中填充为边长 `cube_size` 的立方体.
///
/// 要求 `patch` 各轴长度不超过 `cube_size`, 否则程序 panic.
pub fn pad_to_cube<T: Clone>(patch: ArrayView3<T>, cube_size: usize, fill: T) -> Array3<T> {
    let (z, h, w) = patch.dim();
    let [(lz, _), (lh, _), (lw, _)] = [z, h, w].map(|e| pad_widths(e, cube_size));
    let mut out = Array3::from_elem((cube_size, cube_size, cube_size), fill);
    out.slice_mut(s![lz..lz + z, lh..lh + h, lw..lw + w])
        .assign(&patch);
    out
}

/// 去掉 [`pad_to_cube`] 添加的填充, 得到原始裁剪内容的视图.
pub fn unpad<T>(padded: ArrayView3<T>, pads: PadWidths) -> ArrayView3<T> {
    let (z, h, w) = padded.dim();
    let [(lz, rz), (lh, rh), (lw, rw)] = pads;
    padded.slice_move(s![lz..z - rz, lh..h - rh, lw..w - rw])
}

/// 同一空间位置上的三个 patch: 扫描, 先验实例, 真值.
#[derive(Debug, Clone)]
pub struct Patches {
    /// 扫描 patch.
    pub image: Array3<f32>,

    /// 先验实例 patch.
    pub instance: Array3<u8>,

    /// 真值 patch.
    pub truth: Array3<u8>,
}

impl Patches {
    /// 三个 patch 的形状. 三者形状总是相同.
    #[inline]
    pub fn dim(&self) -> Idx3d {
        debug_assert_eq!(self.image.dim(), self.truth.dim());
        debug_assert_eq!(self.instance.dim(), self.truth.dim());
        self.truth.dim()
    }
}

/// 一次裁剪 + 填充的结果及其几何信息.
#[derive(Debug, Clone)]
pub struct Cropped {
    /// 填充后的三个 patch.
    pub patches: Patches,

    /// 取样区域.
    pub region: Region,

    /// 中心点.
    pub center: [usize; 3],

    /// 原数据上的裁剪窗口.
    pub window: Window,

    /// 各轴的填充宽度.
    pub pads: PadWidths,
}

/// 数组的最小值. 若数组为空则返回 `None`.
#[inline]
fn mask_min(data: &Array3<u8>) -> Option<u8> {
    data.iter().copied().min()
}

/// 随机 patch 采样器. 独占裁剪和填充逻辑.
#[derive(Copy, Clone, Debug)]
pub struct PatchSampler {
    config: SamplerConfig,
}

impl PatchSampler {
    /// 创建采样器. 配置不合法时返回 `Err`.
    pub fn new(config: SamplerConfig) -> SampleResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 采样配置.
    #[inline]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// 选择取样区域: 以 `background_prob` 的概率取整幅数据,
    /// 否则取 `truth` 的非零包围盒.
    ///
    /// `truth` 中没有前景时返回 [`SampleError::EmptyMask`].
    pub fn choose_region<R: Rng + ?Sized>(
        &self,
        truth: ArrayView3<u8>,
        rng: &mut R,
    ) -> SampleResult<Region> {
        if rng.gen_bool(self.config.background_prob) {
            Ok(Region::full(truth.dim()))
        } else {
            Region::bounding_box(truth).ok_or(SampleError::EmptyMask)
        }
    }

    /// 从 `scan` 和 `masks` 中随机裁剪出三个对齐的 patch, 并填充为立方体.
    ///
    /// 每个数组用 **其完整原数组** 的最小值填充, 而不是 patch 自身的最小值.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        scan: &CtScan,
        masks: &InstanceMasks,
        rng: &mut R,
    ) -> SampleResult<Cropped> {
        if scan.shape() != masks.truth.dim() {
            return Err(SampleError::ShapeMismatch {
                scan: scan.shape(),
                label: masks.truth.dim(),
            });
        }
        let cube = self.config.cube_size;
        let region = self.choose_region(masks.truth.view(), rng)?;
        let center = region.draw_center(rng);
        let window = region.window(center, cube);
        log::trace!("{:?} region {region:?}, center {center:?}, window {window:?}", region.kind);

        let image_fill = scan.min_hu().unwrap_or(0.0);
        let instance_fill = mask_min(&masks.prior).unwrap_or(0);
        let truth_fill = mask_min(&masks.truth).unwrap_or(0);

        let patches = Patches {
            image: pad_to_cube(window.view(scan.data()), cube, image_fill),
            instance: pad_to_cube(window.view(masks.prior.view()), cube, instance_fill),
            truth: pad_to_cube(window.view(masks.truth.view()), cube, truth_fill),
        };
        let pads = window.extent().map(|e| pad_widths(e, cube));

        Ok(Cropped {
            patches,
            region,
            center,
            window,
            pads,
        })
    }
}
