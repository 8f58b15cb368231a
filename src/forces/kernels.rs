//! Acceleration kernels: sum the pull of a batch of point masses on one star.
//!
//! Three versions compute the same sum. [`accumulate_scalar`] is the reference;
//! [`accumulate_batched`] works in fixed lanes of [`LANES`] so the compiler can
//! vectorize it; `accumulate_avx` uses explicit 256-bit intrinsics on x86_64.
//! [`accumulate`] picks the fastest one available at runtime.
use crate::utils::{ForceLaw, PhysicsParams};

/// Sources per vector lane group.
pub const LANES: usize = 8;

/// Point masses in structure-of-arrays form, padded with zero-mass entries to a
/// multiple of [`LANES`].
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    x: Vec<f32>,
    y: Vec<f32>,
    m: Vec<f32>,
    len: usize,
}

impl SourceBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        let padded = capacity.next_multiple_of(LANES);
        Self {
            x: Vec::with_capacity(padded),
            y: Vec::with_capacity(padded),
            m: Vec::with_capacity(padded),
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.m.clear();
        self.len = 0;
    }

    /// Appends one point mass. Call [`SourceBatch::pad`] before summing.
    pub fn push(&mut self, x: f32, y: f32, m: f32) {
        self.x.truncate(self.len);
        self.y.truncate(self.len);
        self.m.truncate(self.len);
        self.x.push(x);
        self.y.push(y);
        self.m.push(m);
        self.len += 1;
    }

    /// Appends unit-mass stars.
    pub fn extend_stars(&mut self, px: &[f32], py: &[f32]) {
        self.x.truncate(self.len);
        self.y.truncate(self.len);
        self.m.truncate(self.len);
        self.x.extend_from_slice(px);
        self.y.extend_from_slice(py);
        self.m.resize(self.len + px.len(), 1.0);
        self.len += px.len();
    }

    /// Fills the tail up to the next multiple of [`LANES`] with massless sources.
    pub fn pad(&mut self) {
        let padded = self.len.next_multiple_of(LANES);
        self.x.resize(padded, 0.0);
        self.y.resize(padded, 0.0);
        self.m.resize(padded, 0.0);
    }

    /// Number of real (non-padding) sources.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length including padding.
    pub fn padded_len(&self) -> usize {
        self.x.len()
    }

    pub fn total_mass(&self) -> f32 {
        self.m.iter().sum()
    }

    pub fn xs(&self) -> &[f32] {
        &self.x
    }

    pub fn ys(&self) -> &[f32] {
        &self.y
    }

    pub fn masses(&self) -> &[f32] {
        &self.m
    }
}

/// Acceleration scale `s` such that one source contributes `s * (dx, dy)`.
#[inline(always)]
fn pull(d2: f32, m: f32, gravity: f32, law: ForceLaw) -> f32 {
    match law {
        ForceLaw::ClampedInverseSquare { max_accel } => {
            if d2 > 0.0 {
                (gravity / d2).min(max_accel) * m / d2.sqrt()
            } else {
                0.0
            }
        }
        ForceLaw::SoftenedInverseCube { epsilon } => {
            let d = d2.sqrt().max(epsilon);
            gravity * m / (d * d * d)
        }
    }
}

/// Straight loop over every source.
pub fn accumulate_scalar(px: f32, py: f32, batch: &SourceBatch, physics: &PhysicsParams) -> (f32, f32) {
    let mut ax = 0.0;
    let mut ay = 0.0;
    for ((&x, &y), &m) in batch.x.iter().zip(&batch.y).zip(&batch.m) {
        let dx = x - px;
        let dy = y - py;
        let s = pull(dx * dx + dy * dy, m, physics.gravity, physics.force_law);
        ax += s * dx;
        ay += s * dy;
    }
    (ax, ay)
}

/// Sums in groups of [`LANES`] with one accumulator per lane.
pub fn accumulate_batched(px: f32, py: f32, batch: &SourceBatch, physics: &PhysicsParams) -> (f32, f32) {
    let mut lane_ax = [0.0f32; LANES];
    let mut lane_ay = [0.0f32; LANES];
    let xs = batch.x.chunks_exact(LANES);
    let ys = batch.y.chunks_exact(LANES);
    let ms = batch.m.chunks_exact(LANES);
    let (rx, ry, rm) = (xs.remainder(), ys.remainder(), ms.remainder());

    for ((x, y), m) in xs.zip(ys).zip(ms) {
        for l in 0..LANES {
            let dx = x[l] - px;
            let dy = y[l] - py;
            let s = pull(dx * dx + dy * dy, m[l], physics.gravity, physics.force_law);
            lane_ax[l] += s * dx;
            lane_ay[l] += s * dy;
        }
    }

    let mut ax: f32 = lane_ax.iter().sum();
    let mut ay: f32 = lane_ay.iter().sum();
    for ((&x, &y), &m) in rx.iter().zip(ry).zip(rm) {
        let dx = x - px;
        let dy = y - py;
        let s = pull(dx * dx + dy * dy, m, physics.gravity, physics.force_law);
        ax += s * dx;
        ay += s * dy;
    }
    (ax, ay)
}

/// AVX version of [`accumulate_batched`].
///
/// # Safety
///
/// The CPU must support AVX.
#[cfg(all(target_arch = "x86_64", feature = "avx-simd"))]
#[target_feature(enable = "avx")]
pub unsafe fn accumulate_avx(px: f32, py: f32, batch: &SourceBatch, physics: &PhysicsParams) -> (f32, f32) {
    use std::arch::x86_64::*;

    let n = batch.x.len();
    let p_x = _mm256_set1_ps(px);
    let p_y = _mm256_set1_ps(py);
    let g = _mm256_set1_ps(physics.gravity);
    let zero = _mm256_setzero_ps();
    let mut acc_x = zero;
    let mut acc_y = zero;

    let mut i = 0;
    while i + LANES <= n {
        let dx = _mm256_sub_ps(_mm256_loadu_ps(batch.x.as_ptr().add(i)), p_x);
        let dy = _mm256_sub_ps(_mm256_loadu_ps(batch.y.as_ptr().add(i)), p_y);
        let m = _mm256_loadu_ps(batch.m.as_ptr().add(i));
        let d2 = _mm256_add_ps(_mm256_mul_ps(dx, dx), _mm256_mul_ps(dy, dy));

        let s = match physics.force_law {
            ForceLaw::ClampedInverseSquare { max_accel } => {
                let accel = _mm256_min_ps(_mm256_div_ps(g, d2), _mm256_set1_ps(max_accel));
                let s = _mm256_div_ps(_mm256_mul_ps(accel, m), _mm256_sqrt_ps(d2));
                // Coincident sources give inf or NaN above; zero them.
                _mm256_and_ps(s, _mm256_cmp_ps::<_CMP_GT_OQ>(d2, zero))
            }
            ForceLaw::SoftenedInverseCube { epsilon } => {
                let d = _mm256_max_ps(_mm256_sqrt_ps(d2), _mm256_set1_ps(epsilon));
                let d3 = _mm256_mul_ps(_mm256_mul_ps(d, d), d);
                _mm256_div_ps(_mm256_mul_ps(g, m), d3)
            }
        };

        acc_x = _mm256_add_ps(acc_x, _mm256_mul_ps(s, dx));
        acc_y = _mm256_add_ps(acc_y, _mm256_mul_ps(s, dy));
        i += LANES;
    }

    let mut lane_ax = [0.0f32; LANES];
    let mut lane_ay = [0.0f32; LANES];
    _mm256_storeu_ps(lane_ax.as_mut_ptr(), acc_x);
    _mm256_storeu_ps(lane_ay.as_mut_ptr(), acc_y);
    let mut ax: f32 = lane_ax.iter().sum();
    let mut ay: f32 = lane_ay.iter().sum();

    for j in i..n {
        let dx = batch.x[j] - px;
        let dy = batch.y[j] - py;
        let s = pull(dx * dx + dy * dy, batch.m[j], physics.gravity, physics.force_law);
        ax += s * dx;
        ay += s * dy;
    }
    (ax, ay)
}

/// Acceleration on a star at `(px, py)` from every source in `batch`.
pub fn accumulate(px: f32, py: f32, batch: &SourceBatch, physics: &PhysicsParams) -> (f32, f32) {
    #[cfg(all(target_arch = "x86_64", feature = "avx-simd"))]
    {
        if is_x86_feature_detected!("avx") {
            // SAFETY: AVX support was just checked.
            return unsafe { accumulate_avx(px, py, batch, physics) };
        }
    }
    accumulate_batched(px, py, batch, physics)
}
