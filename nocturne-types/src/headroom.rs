//! Gain staging for summed layers.
//!
//! N uncorrelated unit signals sum to an expected RMS of sqrt(N), so each
//! layer is scaled by 1/sqrt(N) instead of hard limiting the output.

/// Per-track gain for `active_count` simultaneously playing layers, in (0, 1].
pub fn headroom_gain(active_count: usize) -> f32 {
    if active_count == 0 {
        return 1.0;
    }
    let gain = 1.0 / (active_count as f32).sqrt();
    if gain.is_finite() {
        gain.min(1.0)
    } else {
        1.0
    }
}

/// Linear volume sent to a backend for one layer:
/// `volume/100 * master/100 * headroom_gain(active_count)`.
pub fn effective_volume(volume: u8, master_volume: u8, active_count: usize) -> f32 {
    let v = f32::from(volume.min(100)) / 100.0;
    let m = f32::from(master_volume.min(100)) / 100.0;
    v * m * headroom_gain(active_count)
}
