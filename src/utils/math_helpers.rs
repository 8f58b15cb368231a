/// Radical inverse of `index` in the given base: the `index`th element of the
/// one-dimensional Halton sequence, in `[0, 1)`.
///
/// Pairing bases 2 and 3 yields an evenly spread, low-discrepancy point set in
/// the unit square.
#[inline]
pub fn halton(index: u32, base: u32) -> f32 {
    let mut result = 0.0_f32;
    let mut f = 1.0 / base as f32;
    let mut i = index;
    while i > 0 {
        result += f * (i % base) as f32;
        i /= base;
        f /= base as f32;
    }
    result
}

/// Iterator over Halton(2,3) points that fall strictly inside the unit disc.
///
/// Candidates outside the disc are skipped, so the sequence index advances faster
/// than the number of points yielded.
pub struct HaltonDisc {
    index: u32,
}

impl HaltonDisc {
    pub fn new() -> Self {
        Self { index: 0 }
    }
}

impl Default for HaltonDisc {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for HaltonDisc {
    type Item = (f32, f32);

    fn next(&mut self) -> Option<(f32, f32)> {
        loop {
            let px = -1.0 + 2.0 * halton(self.index, 2);
            let py = -1.0 + 2.0 * halton(self.index, 3);
            self.index = self.index.checked_add(1)?;
            if px * px + py * py < 1.0 {
                return Some((px, py));
            }
        }
    }
}

/// Fixed simulation sub-step, in seconds.
pub const SUBSTEP: f32 = 1.0 / 120.0;

/// Most sub-steps a single frame will compensate for (below 20 fps the
/// simulation slows down instead).
pub const MAX_SUBSTEPS: usize = 6;

/// Number of fixed 1/120 s sub-steps a driver should run for a frame that took
/// `period` seconds, capped at [`MAX_SUBSTEPS`].
///
/// Implausible periods (non-positive, or a second and longer) are treated as a
/// nominal 60 Hz frame.
pub fn substeps_for(period: f32) -> usize {
    let period = if period > 0.0 && period < 1.0 { period } else { 1.0 / 60.0 };
    let steps = (period / SUBSTEP).round() as usize;
    steps.clamp(1, MAX_SUBSTEPS)
}
