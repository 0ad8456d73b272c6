// crates/rf_foundation/src/kahan_sum.rs

//! Kahan 补偿求和
//!
//! 全流域水量平衡的各项总量达到 1e12 m³ 量级，而单步误差需检测到 1e-3 m³，
//! 普通累加会吞掉这些差值。

use num_traits::Float;

/// Kahan 求和器
///
/// ```
/// use rf_foundation::KahanSum;
///
/// let total = KahanSum::sum_iter(vec![0.1f64; 1000]);
/// assert!((total - 100.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum<S: Float> {
    sum: S,
    compensation: S,
}

impl<S: Float> KahanSum<S> {
    /// 创建新的求和器
    pub fn new() -> Self {
        Self {
            sum: S::zero(),
            compensation: S::zero(),
        }
    }

    /// 添加一个值
    #[inline]
    pub fn add(&mut self, value: S) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 获取当前求和值
    #[inline]
    pub fn value(&self) -> S {
        self.sum
    }

    /// 重置求和器
    #[inline]
    pub fn reset(&mut self) {
        self.sum = S::zero();
        self.compensation = S::zero();
    }

    /// 从迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = S>>(iter: I) -> S {
        let mut kahan = Self::new();
        for v in iter {
            kahan.add(v);
        }
        kahan.value()
    }
}

/// 切片补偿求和
#[inline]
pub fn kahan_sum(values: &[f64]) -> f64 {
    KahanSum::sum_iter(values.iter().copied())
}
