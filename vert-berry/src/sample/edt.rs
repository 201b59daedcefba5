//! 三维精确欧氏距离变换.
//!
//! 使用 Felzenszwalb & Huttenlocher 的下包络算法: 先对平方距离沿每个轴依次做
//! 一维变换, 最后开方. 总复杂度与体素数成线性关系.

use ndarray::{Array3, ArrayView3, ArrayViewMut1, Axis};

/// 一维平方距离变换的工作区, 可在多行之间复用.
#[derive(Debug, Default)]
struct LineBuf {
    f: Vec<f64>,
    v: Vec<usize>,
    z: Vec<f64>,
}

impl LineBuf {
    /// 就地变换一行: `lane[q] <- min_p (q - p)^2 + lane[p]`.
    ///
    /// 取值为 `INFINITY` 的点不参与下包络. 若整行都是 `INFINITY`, 则保持不变.
    fn transform(&mut self, mut lane: ArrayViewMut1<f64>) {
        let Self { f, v, z } = self;
        f.clear();
        f.extend(lane.iter().copied());
        v.clear();
        z.clear();

        for (q, &fq) in f.iter().enumerate() {
            if !fq.is_finite() {
                continue;
            }
            let qf = q as f64;
            while let Some(&p) = v.last() {
                let pf = p as f64;
                let s = ((fq + qf * qf) - (f[p] + pf * pf)) / (2.0 * (qf - pf));
                if z.last().is_some_and(|&zl| s <= zl) {
                    v.pop();
                    z.pop();
                } else {
                    z.push(s);
                    break;
                }
            }
            if v.is_empty() {
                z.push(f64::NEG_INFINITY);
            }
            v.push(q);
        }
        if v.is_empty() {
            return;
        }
        z.push(f64::INFINITY);

        let mut k = 0;
        for (q, out) in lane.iter_mut().enumerate() {
            let qf = q as f64;
            while z[k + 1] < qf {
                k += 1;
            }
            let p = v[k];
            let d = qf - p as f64;
            *out = d * d + f[p];
        }
    }
}

/// 初始化: 目标体素为 0, 其余为 `INFINITY`.
fn init(targets: ArrayView3<bool>) -> Array3<f64> {
    targets.mapv(|t| if t { 0.0 } else { f64::INFINITY })
}

fn sweep_axis(data: &mut Array3<f64>, axis: Axis) {
    let mut buf = LineBuf::default();
    for lane in data.lanes_mut(axis) {
        buf.transform(lane);
    }
}

/// 每个体素到最近的 `targets` 体素的平方欧氏距离 (以体素为单位).
///
/// 若不存在任何目标体素, 所有距离均为 `INFINITY`.
pub fn squared_distance_to(targets: ArrayView3<bool>) -> Array3<f64> {
    let mut data = init(targets);
    for axis in 0..3 {
        sweep_axis(&mut data, Axis(axis));
    }
    data
}

/// 每个体素到最近的 `targets` 体素的欧氏距离.
///
/// 若不存在任何目标体素, 所有距离均为 `INFINITY`.
pub fn distance_to(targets: ArrayView3<bool>) -> Array3<f64> {
    let mut data = squared_distance_to(targets);
    data.mapv_inplace(f64::sqrt);
    data
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::Zip;

        fn par_sweep_axis(data: &mut Array3<f64>, axis: Axis) {
            Zip::from(data.lanes_mut(axis)).par_for_each(|lane| {
                LineBuf::default().transform(lane);
            });
        }

        /// [`squared_distance_to`] 的并行版本, 结果完全相同.
        pub fn par_squared_distance_to(targets: ArrayView3<bool>) -> Array3<f64> {
            let mut data = init(targets);
            for axis in 0..3 {
                par_sweep_axis(&mut data, Axis(axis));
            }
            data
        }

        /// [`distance_to`] 的并行版本, 结果完全相同.
        pub fn par_distance_to(targets: ArrayView3<bool>) -> Array3<f64> {
            let mut data = par_squared_distance_to(targets);
            data.par_mapv_inplace(f64::sqrt);
            data
        }
    }
}
