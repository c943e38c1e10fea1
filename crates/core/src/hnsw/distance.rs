//! Distance kernels for `f32` vectors.
//!
//! The graph itself treats distance as an opaque `Fn(&T, &T) -> f32`; these
//! kernels are the ready-made functions for dense vectors. All of them return
//! a value where **lower is closer** and are symmetric in their arguments.
//! On x86_64 with AVX2+FMA the dot and L2 loops run 16 lanes at a time,
//! otherwise a scalar loop is used.

use serde::{Deserialize, Serialize};

/// Distance metric over `f32` slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
    /// `1 - dot(a, b)`; equals [`DistanceMetric::Cosine`] when both inputs are unit length.
    UnitCosine,
    /// Squared Euclidean distance (L2²). Range: \[0, ∞).
    Euclidean,
    /// Negative dot product: `-dot(a, b)`. Lower = higher similarity.
    DotProduct,
}

impl DistanceMetric {
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::UnitCosine => unit_cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_sq_distance(a, b),
            DistanceMetric::DotProduct => negative_dot_distance(a, b),
        }
    }
}

/// `1 - cos(a, b)`, computing both norms. Zero-norm inputs give distance 1.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_f32(a, b)
}

/// `1 - dot(a, b)` for vectors already normalized to unit length.
#[inline]
pub fn unit_cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot_product_f32(a, b)
}

#[inline]
pub fn euclidean_sq_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_sq_f32(a, b)
}

#[inline]
pub fn negative_dot_distance(a: &[f32], b: &[f32]) -> f32 {
    -dot_product_f32(a, b)
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = dot_product_f32(v, v).sqrt();
    if norm > 1e-10 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two f32 slices, built on the dot kernel.
/// Zero-norm inputs give similarity 0.
#[inline]
pub fn cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let denom = dot_product_f32(a, a).sqrt() * dot_product_f32(b, b).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    dot_product_f32(a, b) / denom
}

/// Squared Euclidean distance between two f32 slices.
#[inline]
#[allow(unreachable_code)]
pub fn euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { avx2_euclidean_sq_f32(a, b) };
        }
    }
    scalar_euclidean_sq_f32(a, b)
}

/// Dot product between two f32 slices.
#[inline]
#[allow(unreachable_code)]
pub fn dot_product_f32(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { avx2_dot_product_f32(a, b) };
        }
    }
    scalar_dot_product_f32(a, b)
}

fn scalar_euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn scalar_dot_product_f32(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

// AVX2 + FMA kernels: two 8-lane accumulators per loop, scalar tail.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn hsum_f32x8(v: __m256) -> f32 {
    let hi128 = _mm256_extractf128_ps(v, 1);
    let lo128 = _mm256_castps256_ps128(v);
    let sum128 = _mm_add_ps(lo128, hi128);
    let hi64 = _mm_movehl_ps(sum128, sum128);
    let sum64 = _mm_add_ps(sum128, hi64);
    let hi32 = _mm_shuffle_ps(sum64, sum64, 0x55);
    _mm_cvtss_f32(_mm_add_ss(sum64, hi32))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let chunks = len / 16;
    for i in 0..chunks {
        let base = i * 16;
        let d0 = _mm256_sub_ps(
            _mm256_loadu_ps(a_ptr.add(base)),
            _mm256_loadu_ps(b_ptr.add(base)),
        );
        let d1 = _mm256_sub_ps(
            _mm256_loadu_ps(a_ptr.add(base + 8)),
            _mm256_loadu_ps(b_ptr.add(base + 8)),
        );
        s0 = _mm256_fmadd_ps(d0, d0, s0);
        s1 = _mm256_fmadd_ps(d1, d1, s1);
    }

    let mut sum = hsum_f32x8(_mm256_add_ps(s0, s1));

    for i in (chunks * 16)..len {
        let d = *a_ptr.add(i) - *b_ptr.add(i);
        sum += d * d;
    }
    sum
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_dot_product_f32(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let chunks = len / 16;
    for i in 0..chunks {
        let base = i * 16;
        s0 = _mm256_fmadd_ps(
            _mm256_loadu_ps(a_ptr.add(base)),
            _mm256_loadu_ps(b_ptr.add(base)),
            s0,
        );
        s1 = _mm256_fmadd_ps(
            _mm256_loadu_ps(a_ptr.add(base + 8)),
            _mm256_loadu_ps(b_ptr.add(base + 8)),
            s1,
        );
    }

    let mut sum = hsum_f32x8(_mm256_add_ps(s0, s1));

    for i in (chunks * 16)..len {
        sum += *a_ptr.add(i) * *b_ptr.add(i);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Matches the tolerance used when comparing the two cosine forms.
    const FLOAT_ERROR: f32 = 0.000_000_900;

    fn unit_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
        let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        normalize(&mut v);
        v
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let d = DistanceMetric::Cosine.distance(&a, &b);
        assert!((d - 1.0).abs() < 0.001, "orthogonal cosine distance = 1.0, got {d}");
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b: Vec<f32> = a.iter().map(|x| x * 10.0).collect();
        let d = cosine_distance(&a, &b);
        assert!(d.abs() < 1e-6, "parallel vectors should have distance ~0, got {d}");
    }

    #[test]
    fn test_euclidean() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![3.0, 4.0, 0.0];
        let d = DistanceMetric::Euclidean.distance(&a, &b);
        assert!((d - 25.0).abs() < 0.001, "squared euclidean should be 25, got {d}");
    }

    #[test]
    fn test_dot_product() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        let d = DistanceMetric::DotProduct.distance(&a, &b);
        assert!((d - (-32.0)).abs() < 0.001, "negative dot product should be -32, got {d}");
    }

    #[test]
    fn test_cosine_and_unit_cosine_agree_on_normalized_vectors() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let a = unit_vector(&mut rng, 32);
            let b = unit_vector(&mut rng, 32);
            let cosine = cosine_distance(&a, &b);
            let dot = unit_cosine_distance(&a, &b);
            assert!(
                (cosine - dot).abs() <= FLOAT_ERROR,
                "cosine={cosine} unit_cosine={dot}"
            );
        }
    }

    #[test]
    fn test_kernels_are_symmetric() {
        let mut rng = StdRng::seed_from_u64(5);
        // 37 lanes exercises both the 16-wide body and the scalar tail
        let a: Vec<f32> = (0..37).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let b: Vec<f32> = (0..37).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        for metric in [
            DistanceMetric::Cosine,
            DistanceMetric::UnitCosine,
            DistanceMetric::Euclidean,
            DistanceMetric::DotProduct,
        ] {
            assert_eq!(
                metric.distance(&a, &b).to_bits(),
                metric.distance(&b, &a).to_bits(),
                "{metric:?} not symmetric"
            );
        }
    }

    #[test]
    fn test_simd_matches_scalar() {
        let mut rng = StdRng::seed_from_u64(9);
        let a: Vec<f32> = (0..100).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let b: Vec<f32> = (0..100).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        assert!((dot_product_f32(&a, &b) - scalar_dot_product_f32(&a, &b)).abs() < 1e-4);
        assert!((euclidean_sq_f32(&a, &b) - scalar_euclidean_sq_f32(&a, &b)).abs() < 1e-3);
        let reference = scalar_dot_product_f32(&a, &b)
            / (scalar_dot_product_f32(&a, &a).sqrt() * scalar_dot_product_f32(&b, &b).sqrt());
        assert!((cosine_f32(&a, &b) - reference).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0; 4];
        normalize(&mut zero);
        assert!(zero.iter().all(|&x| x == 0.0));
    }
}
