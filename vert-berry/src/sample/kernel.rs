//! [`VolumeTransform`] 的默认实现.
//!
//! 高斯滤波按轴可分离地逐行进行; 弹性形变由平滑后的随机位移场加三线性插值完成.

use ndarray::{s, Array3, ArrayView3, Axis, Zip};
use ordered_float::OrderedFloat;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{Patches, VolumeTransform};
use crate::consts::{gray::BACKGROUND, BLUR_SIGMA_RANGE, GAUSSIAN_TRUNCATE, NOISE_STD};
use crate::{SampleError, SampleResult};

/// 一维滤波在数据两端的延拓方式.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Boundary {
    /// 镜像延拓, `d c b a | a b c d | d c b a`.
    Reflect,

    /// 常数延拓.
    Constant(f32),
}

/// 将越界下标 `i` 镜像回 `0..n`.
#[inline]
fn reflect_index(mut i: isize, n: isize) -> usize {
    debug_assert!(n > 0);
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        } else {
            return i as usize;
        }
    }
}

/// 归一化的一维高斯核, 半径为 `ceil(4 sigma)` (至少为 1).
pub fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    debug_assert!(sigma > 0.0);
    let radius = ((GAUSSIAN_TRUNCATE * sigma).ceil() as isize).max(1);
    let denom = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (-radius..=radius)
        .map(|x| (-(x * x) as f64 / denom).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// 沿 `axis` 就地做一维卷积. `kernel` 长度必须为奇数.
pub fn convolve_axis(data: &mut Array3<f32>, axis: Axis, kernel: &[f32], boundary: Boundary) {
    debug_assert!(kernel.len() % 2 == 1);
    let radius = (kernel.len() / 2) as isize;
    let mut line = Vec::new();
    for mut lane in data.lanes_mut(axis) {
        let n = lane.len() as isize;
        line.clear();
        line.extend(lane.iter().copied());
        for (i, out) in lane.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (j, &k) in kernel.iter().enumerate() {
                let src = i as isize + j as isize - radius;
                let v = if (0..n).contains(&src) {
                    line[src as usize]
                } else {
                    match boundary {
                        Boundary::Reflect => line[reflect_index(src, n)],
                        Boundary::Constant(c) => c,
                    }
                };
                acc += k * v;
            }
            *out = acc;
        }
    }
}

/// 三维各向同性高斯滤波.
pub fn gaussian_filter(data: ArrayView3<f32>, sigma: f64, boundary: Boundary) -> Array3<f32> {
    let kernel = gaussian_kernel(sigma);
    let mut out = data.to_owned();
    for axis in 0..3 {
        convolve_axis(&mut out, Axis(axis), &kernel, boundary);
    }
    out
}

/// 在实数坐标 `(z, h, w)` 处做三线性插值. 越界坐标被截断到边缘.
pub fn trilinear(data: ArrayView3<f32>, z: f64, h: f64, w: f64) -> f32 {
    let (nz, nh, nw) = data.dim();
    let split = |x: f64, n: usize| {
        let x = num::clamp(x, 0.0, (n - 1) as f64);
        let i0 = x.floor() as usize;
        let i1 = (i0 + 1).min(n - 1);
        (i0, i1, (x - i0 as f64) as f32)
    };
    let (z0, z1, fz) = split(z, nz);
    let (h0, h1, fh) = split(h, nh);
    let (w0, w1, fw) = split(w, nw);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let plane = |z| {
        lerp(
            lerp(data[(z, h0, w0)], data[(z, h0, w1)], fw),
            lerp(data[(z, h1, w0)], data[(z, h1, w1)], fw),
            fh,
        )
    };
    lerp(plane(z0), plane(z1), fz)
}

/// 数组的最小值, 忽略 NaN.
fn image_min(data: &Array3<f32>) -> Option<f32> {
    data.iter()
        .filter(|v| !v.is_nan())
        .copied()
        .map(OrderedFloat)
        .min()
        .map(|m| m.0)
}

/// 丢弃第 0 轴上的前 `k` 层, 其余层前移, 末尾用 `fill` 补齐.
pub fn shift_axis0<T: Clone>(data: &Array3<T>, k: usize, fill: T) -> Array3<T> {
    let n = data.len_of(Axis(0));
    let k = k.min(n);
    let mut out = Array3::from_elem(data.dim(), fill);
    out.slice_mut(s![..n - k, .., ..])
        .assign(&data.slice(s![k.., .., ..]));
    out
}

/// 默认变换的参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    /// 高斯模糊标准差的取值范围 `(lo, hi)`, 单位为体素.
    pub blur_sigma: (f64, f64),

    /// 加性噪声的标准差.
    pub noise_std: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            blur_sigma: BLUR_SIGMA_RANGE,
            noise_std: NOISE_STD,
        }
    }
}

impl KernelConfig {
    /// 检查配置是否合法.
    pub fn validate(&self) -> SampleResult<()> {
        let (lo, hi) = self.blur_sigma;
        if !(lo.is_finite() && hi.is_finite() && 0.0 < lo && lo <= hi) {
            return Err(SampleError::InvalidConfig(
                "blur_sigma must be a positive range with lo <= hi",
            ));
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            return Err(SampleError::InvalidConfig("noise_std must be non-negative"));
        }
        Ok(())
    }
}

/// 默认的体数据变换.
#[derive(Copy, Clone, Debug, Default)]
pub struct Kernels {
    config: KernelConfig,
}

impl Kernels {
    /// 使用给定参数创建. 参数不合法时返回 `Err`.
    pub fn new(config: KernelConfig) -> SampleResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 参数.
    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }
}

/// 平滑后的随机位移场: 每个体素在 `[-1, 1]` 上均匀取值,
/// 以零延拓做高斯平滑, 再乘以 `alpha`.
fn displacement<R: Rng + ?Sized>(
    shape: (usize, usize, usize),
    alpha: f64,
    sigma: f64,
    rng: &mut R,
) -> Array3<f32> {
    let uniform = Uniform::new_inclusive(-1.0f32, 1.0);
    let raw = Array3::from_shape_simple_fn(shape, || uniform.sample(&mut *rng));
    let mut field = gaussian_filter(raw.view(), sigma, Boundary::Constant(0.0));
    field *= alpha as f32;
    field
}

impl VolumeTransform for Kernels {
    fn elastic<R: Rng + ?Sized>(
        &self,
        image: ArrayView3<f32>,
        alpha: f64,
        sigma: f64,
        rng: &mut R,
    ) -> Array3<f32> {
        let shape = image.dim();
        if image.is_empty() {
            return image.to_owned();
        }
        let dz = displacement(shape, alpha, sigma, rng);
        let dh = displacement(shape, alpha, sigma, rng);
        let dw = displacement(shape, alpha, sigma, rng);

        let mut out = Array3::zeros(shape);
        let zip = Zip::indexed(&mut out).and(&dz).and(&dh).and(&dw);
        let warp = |(z, h, w): (usize, usize, usize), o: &mut f32, &a: &f32, &b: &f32, &c: &f32| {
            *o = trilinear(
                image,
                z as f64 + a as f64,
                h as f64 + b as f64,
                w as f64 + c as f64,
            );
        };
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                zip.par_for_each(warp);
            } else {
                zip.for_each(warp);
            }
        }
        out
    }

    fn gaussian_blur<R: Rng + ?Sized>(&self, image: ArrayView3<f32>, rng: &mut R) -> Array3<f32> {
        let (lo, hi) = self.config.blur_sigma;
        let sigma = rng.gen_range(lo..=hi);
        log::trace!("gaussian blur, sigma = {sigma:.3}");
        gaussian_filter(image, sigma, Boundary::Reflect)
    }

    fn gaussian_noise<R: Rng + ?Sized>(&self, image: ArrayView3<f32>, rng: &mut R) -> Array3<f32> {
        match Normal::new(0.0f32, self.config.noise_std as f32) {
            Ok(normal) if self.config.noise_std > 0.0 => {
                image.mapv(|v| v + normal.sample(&mut *rng))
            }
            _ => image.to_owned(),
        }
    }

    fn crop_shift(&self, patches: Patches, k: usize) -> Patches {
        if k == 0 {
            return patches;
        }
        let fill = image_min(&patches.image).unwrap_or(0.0);
        Patches {
            image: shift_axis0(&patches.image, k, fill),
            instance: shift_axis0(&patches.instance, k, BACKGROUND),
            truth: shift_axis0(&patches.truth, k, BACKGROUND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// 测试两个 `f32` 是否在给定误差内相等.
    fn float_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn test_reflect_index() {
        let n = 4;
        let got: Vec<usize> = (-5..9).map(|i| reflect_index(i, n)).collect();
        assert_eq!(got, [3, 3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0, 0]);
    }

    #[test]
    fn test_gaussian_kernel() {
        let k = gaussian_kernel(1.0);
        assert_eq!(k.len(), 9);
        assert!(float_eq(k.iter().sum(), 1.0, 1e-6));
        for i in 0..4 {
            assert_eq!(k[i], k[8 - i]);
            assert!(k[i] < k[i + 1]);
        }
    }

    /// 镜像延拓下, 常数体经模糊后保持不变.
    #[test]
    fn test_blur_constant() {
        let data = Array3::from_elem((5, 6, 7), 42.0f32);
        let out = gaussian_filter(data.view(), 1.5, Boundary::Reflect);
        assert!(out.iter().all(|&v| float_eq(v, 42.0, 1e-3)));
    }

    /// 单点脉冲被摊开: 中心值下降, 邻居变为正值, 总和守恒.
    #[test]
    fn test_blur_impulse() {
        let mut data = Array3::<f32>::zeros((11, 11, 11));
        data[(5, 5, 5)] = 1.0;
        let out = gaussian_filter(data.view(), 1.0, Boundary::Constant(0.0));
        assert!(out[(5, 5, 5)] < 1.0);
        assert!(out[(5, 5, 6)] > 0.0);
        assert!(out[(5, 5, 5)] > out[(5, 5, 6)]);
        assert!(float_eq(out.sum(), 1.0, 1e-3));
    }

    #[test]
    fn test_trilinear() {
        let data = Array3::from_shape_fn((3, 4, 5), |(z, h, w)| (z * 100 + h * 10 + w) as f32);
        assert_eq!(trilinear(data.view(), 1.0, 2.0, 3.0), 123.0);
        assert!(float_eq(trilinear(data.view(), 0.5, 0.5, 0.5), 55.5, 1e-4));
        // 越界坐标截断到边缘.
        assert_eq!(trilinear(data.view(), -3.0, 10.0, 4.0), 34.0);
    }

    /// 位移为零时弹性形变是恒等变换.
    #[test]
    fn test_elastic_zero_alpha() {
        let data = Array3::from_shape_fn((6, 6, 6), |(z, h, w)| (z * h + w) as f32);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let out = Kernels::default().elastic(data.view(), 0.0, 2.0, &mut rng);
        assert_eq!(out, data);
    }

    /// 插值结果不会超出原数据的取值范围.
    #[test]
    fn test_elastic_range() {
        let data = Array3::from_shape_fn((8, 8, 8), |(z, h, w)| ((z + h + w) % 5) as f32);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let out = Kernels::default().elastic(data.view(), 300.0, 2.0, &mut rng);
        assert_eq!(out.dim(), data.dim());
        assert!(out.iter().all(|&v| (-1e-4..=4.0001).contains(&v)));
        assert_ne!(out, data);
    }

    #[test]
    fn test_noise_statistics() {
        let data = Array3::<f32>::zeros((32, 32, 32));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let out = Kernels::default().gaussian_noise(data.view(), &mut rng);
        let n = out.len() as f64;
        let mean = out.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = out.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.5, "{mean}");
        assert!((var.sqrt() - NOISE_STD).abs() < 0.5, "{var}");

        let quiet = Kernels::new(KernelConfig {
            noise_std: 0.0,
            ..KernelConfig::default()
        })
        .unwrap();
        assert_eq!(quiet.gaussian_noise(data.view(), &mut rng), data);
    }

    #[test]
    fn test_kernel_config() {
        assert!(KernelConfig::default().validate().is_ok());
        let bad = KernelConfig {
            blur_sigma: (2.0, 1.0),
            ..KernelConfig::default()
        };
        assert!(Kernels::new(bad).is_err());
    }

    #[test]
    fn test_crop_shift() {
        let image = Array3::from_shape_fn((4, 2, 2), |(z, _, _)| z as f32 - 3.0);
        let truth = Array3::from_shape_fn((4, 2, 2), |(z, _, _)| (z % 2) as u8);
        let patches = Patches {
            image,
            instance: Array3::ones((4, 2, 2)),
            truth,
        };
        let k = Kernels::default();

        let same = k.crop_shift(patches.clone(), 0);
        assert_eq!(same.image, patches.image);

        let out = k.crop_shift(patches.clone(), 1);
        assert_eq!(out.dim(), (4, 2, 2));
        assert!(out.image.slice(s![0, .., ..]).iter().all(|&v| v == -2.0));
        assert!(out.image.slice(s![2, .., ..]).iter().all(|&v| v == 0.0));
        // 尾部: 扫描以自身最小值补齐, 掩码补 0.
        assert!(out.image.slice(s![3, .., ..]).iter().all(|&v| v == -3.0));
        assert!(out.instance.slice(s![..3, .., ..]).iter().all(|&v| v == 1));
        assert!(out.instance.slice(s![3, .., ..]).iter().all(|&v| v == 0));
        assert!(out.truth.slice(s![0, .., ..]).iter().all(|&v| v == 1));

        let all = k.crop_shift(patches, 4);
        assert!(all.truth.iter().all(|&v| v == 0));
        assert!(all.image.iter().all(|&v| v == -3.0));
    }
}
