//! SIMD-accelerated vector kernels
//!
//! Feature vectors are short (8-14 columns) and embeddings are 3D, so the
//! AVX2 paths only kick in for wide rows; everything else takes the scalar
//! fallback.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Vector math over `f64` slices
pub struct SimdOps;

impl SimdOps {
    /// Dot product
    #[cfg(target_arch = "x86_64")]
    pub fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        if a.len() < 8 || !is_x86_feature_detected!("avx2") {
            return a.iter().zip(b).map(|(x, y)| x * y).sum();
        }
        unsafe { Self::dot_f64_avx(a, b) }
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn dot_f64_avx(a: &[f64], b: &[f64]) -> f64 {
        let chunks_a = a.chunks_exact(4);
        let chunks_b = b.chunks_exact(4);
        let tail: f64 = chunks_a
            .remainder()
            .iter()
            .zip(chunks_b.remainder())
            .map(|(x, y)| x * y)
            .sum();

        let mut acc = _mm256_setzero_pd();
        for (ca, cb) in chunks_a.zip(chunks_b) {
            let va = _mm256_loadu_pd(ca.as_ptr());
            let vb = _mm256_loadu_pd(cb.as_ptr());
            acc = _mm256_add_pd(acc, _mm256_mul_pd(va, vb));
        }
        Self::horizontal_sum(acc) + tail
    }

    /// Squared Euclidean distance
    #[cfg(target_arch = "x86_64")]
    pub fn squared_euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        if a.len() < 8 || !is_x86_feature_detected!("avx2") {
            return a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        }
        unsafe { Self::squared_distance_avx(a, b) }
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn squared_euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn squared_distance_avx(a: &[f64], b: &[f64]) -> f64 {
        let chunks_a = a.chunks_exact(4);
        let chunks_b = b.chunks_exact(4);
        let tail: f64 = chunks_a
            .remainder()
            .iter()
            .zip(chunks_b.remainder())
            .map(|(x, y)| (x - y) * (x - y))
            .sum();

        let mut acc = _mm256_setzero_pd();
        for (ca, cb) in chunks_a.zip(chunks_b) {
            let diff = _mm256_sub_pd(_mm256_loadu_pd(ca.as_ptr()), _mm256_loadu_pd(cb.as_ptr()));
            acc = _mm256_add_pd(acc, _mm256_mul_pd(diff, diff));
        }
        Self::horizontal_sum(acc) + tail
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn horizontal_sum(v: __m256d) -> f64 {
        let low = _mm256_castpd256_pd128(v);
        let high = _mm256_extractf128_pd(v, 1);
        let sum128 = _mm_add_pd(low, high);
        let high64 = _mm_unpackhi_pd(sum128, sum128);
        _mm_cvtsd_f64(_mm_add_sd(sum128, high64))
    }

    /// Euclidean distance
    pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
        Self::squared_euclidean_distance(a, b).sqrt()
    }

    /// Arithmetic mean, 0 for an empty slice
    pub fn mean_f64(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        data.iter().sum::<f64>() / data.len() as f64
    }

    /// Population variance (ddof = 0)
    pub fn variance_f64(data: &[f64]) -> f64 {
        if data.len() < 2 {
            return 0.0;
        }
        let mean = Self::mean_f64(data);
        data.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / data.len() as f64
    }

    /// Extract column `j` of a row-major matrix
    pub fn column(rows: &[Vec<f64>], j: usize) -> Vec<f64> {
        rows.iter().map(|row| row[j]).collect()
    }

    /// L2-normalize in place; leaves near-zero vectors untouched
    pub fn normalize(v: &mut [f64]) {
        let norm = Self::dot_f64(v, v).sqrt();
        if norm > 1e-12 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
    }
}
