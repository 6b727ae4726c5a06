//! Noise synthesizer: fixed-length stereo loops of white, pink or brown noise.
//!
//! Every call starts from fresh filter state, so the same loop can be
//! regenerated at any time without drifting. Channels are generated
//! independently for a wide stereo image.

use std::f32::consts::PI;

use rand::Rng;

use nocturne_types::{NoiseColor, SynthParams};

/// Length of every generated loop.
pub const BUFFER_SECONDS: f32 = 5.0;

/// Lowest cutoff the shaping filter will sweep down to.
const MIN_CUTOFF_HZ: f32 = 50.0;

const PINK_GAIN: f32 = 0.11;
const BROWN_GAIN: f32 = 3.5;

/// Non-interleaved stereo audio.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    pub fn silent(sample_rate: u32, frames: usize) -> Self {
        Self {
            sample_rate,
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

/// Frames in one loop: `floor(BUFFER_SECONDS * sample_rate)`.
pub fn buffer_frames(sample_rate: u32) -> usize {
    (BUFFER_SECONDS * sample_rate as f32).floor() as usize
}

/// Generate one loop using the thread RNG.
pub fn generate(color: NoiseColor, sample_rate: u32) -> StereoBuffer {
    generate_with(color, sample_rate, &mut rand::thread_rng())
}

/// Generate one loop from the given RNG.
pub fn generate_with<R: Rng + ?Sized>(
    color: NoiseColor,
    sample_rate: u32,
    rng: &mut R,
) -> StereoBuffer {
    let frames = buffer_frames(sample_rate);
    let mut buffer = StereoBuffer::silent(sample_rate, frames);
    fill(color, &mut buffer.left, rng);
    fill(color, &mut buffer.right, rng);
    buffer
}

/// Generate and shape a loop for a synthetic catalog entry.
pub fn render(params: &SynthParams, sample_rate: u32) -> StereoBuffer {
    let mut buffer = generate(params.color, sample_rate);
    shape(&mut buffer, params);
    buffer
}

fn fill<R: Rng + ?Sized>(color: NoiseColor, out: &mut [f32], rng: &mut R) {
    match color {
        NoiseColor::White => {
            for s in out.iter_mut() {
                *s = rng.gen_range(-1.0_f32..=1.0);
            }
        }
        NoiseColor::Pink => {
            // Paul Kellett's refined pink filter.
            let (mut b0, mut b1, mut b2, mut b3, mut b4, mut b5, mut b6) =
                (0.0_f32, 0.0_f32, 0.0_f32, 0.0_f32, 0.0_f32, 0.0_f32, 0.0_f32);
            for s in out.iter_mut() {
                let white = rng.gen_range(-1.0_f32..=1.0);
                b0 = 0.99886 * b0 + white * 0.0555179;
                b1 = 0.99332 * b1 + white * 0.0750759;
                b2 = 0.96900 * b2 + white * 0.1538520;
                b3 = 0.86650 * b3 + white * 0.3104856;
                b4 = 0.55000 * b4 + white * 0.5329522;
                b5 = -0.7616 * b5 - white * 0.0168980;
                let pink = b0 + b1 + b2 + b3 + b4 + b5 + b6 + white * 0.5362;
                b6 = white * 0.115926;
                *s = pink * PINK_GAIN;
            }
        }
        NoiseColor::Brown => {
            let mut last = 0.0_f32;
            for s in out.iter_mut() {
                let white = rng.gen_range(-1.0_f32..=1.0);
                last = (last + 0.02 * white) / 1.02;
                *s = last * BROWN_GAIN;
            }
        }
    }
}

/// Apply the optional low-pass filter and cutoff modulation in place.
///
/// The modulation rate is snapped to a whole number of cycles per loop and
/// the filter is warmed on the loop's tail, so the seam is continuous.
pub fn shape(buffer: &mut StereoBuffer, params: &SynthParams) {
    let Some(filter) = params.filter else {
        return;
    };
    if buffer.is_empty() || buffer.sample_rate == 0 {
        return;
    }
    let sample_rate = buffer.sample_rate as f32;
    let nyquist = sample_rate / 2.0;
    let loop_seconds = buffer.frames() as f32 / sample_rate;

    let (rate, depth) = match params.modulation {
        Some(m) if m.rate_hz > 0.0 && m.depth_hz > 0.0 => {
            let cycles = (m.rate_hz * loop_seconds).round().max(1.0);
            (cycles / loop_seconds, m.depth_hz)
        }
        _ => (0.0, 0.0),
    };

    let dt = 1.0 / sample_rate;
    let alpha_at = |frame: usize| {
        let t = frame as f32 * dt;
        let cutoff = (filter.cutoff_hz + depth * (2.0 * PI * rate * t).sin())
            .clamp(MIN_CUTOFF_HZ, nyquist.max(MIN_CUTOFF_HZ));
        let rc = 1.0 / (2.0 * PI * cutoff);
        dt / (rc + dt)
    };

    let warm_frames = buffer.sample_rate as usize / 10;
    for channel in [&mut buffer.left, &mut buffer.right] {
        let frames = channel.len();
        let warmup = frames.min(warm_frames);
        let mut y = 0.0_f32;
        for frame in frames - warmup..frames {
            y += alpha_at(frame) * (channel[frame] - y);
        }
        for (frame, sample) in channel.iter_mut().enumerate() {
            y += alpha_at(frame) * (*sample - y);
            *sample = y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nocturne_types::{FilterSpec, Modulation};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SR: u32 = 8_000;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_buffer_length() {
        assert_eq!(buffer_frames(44_100), 220_500);
        assert_eq!(buffer_frames(22_050), 110_250);
        let buf = generate(NoiseColor::White, SR);
        assert_eq!(buf.frames(), 40_000);
        assert_eq!(buf.right.len(), buf.left.len());
    }

    #[test]
    fn test_all_colors_finite_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            let buf = generate_with(color, SR, &mut rng);
            assert!(buf.left.iter().chain(&buf.right).all(|s| s.is_finite()));
            assert!(buf.peak() < 2.0, "{color:?} peak {}", buf.peak());
            let level = rms(&buf.left);
            assert!(level > 0.02 && level < 0.7, "{color:?} rms {level}");
        }
    }

    #[test]
    fn test_white_within_unit_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let buf = generate_with(NoiseColor::White, SR, &mut rng);
        assert!(buf.peak() <= 1.0);
    }

    #[test]
    fn test_channels_independent() {
        let mut rng = StdRng::seed_from_u64(3);
        let buf = generate_with(NoiseColor::Pink, SR, &mut rng);
        assert_ne!(buf.left, buf.right);
    }

    #[test]
    fn test_same_seed_same_loop() {
        let a = generate_with(NoiseColor::Brown, SR, &mut StdRng::seed_from_u64(42));
        let b = generate_with(NoiseColor::Brown, SR, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_lowpass_reduces_energy() {
        let mut rng = StdRng::seed_from_u64(11);
        let raw = generate_with(NoiseColor::White, SR, &mut rng);
        let mut shaped = raw.clone();
        shape(
            &mut shaped,
            &SynthParams {
                color: NoiseColor::White,
                filter: Some(FilterSpec { cutoff_hz: 1000.0 }),
                modulation: Some(Modulation {
                    rate_hz: 0.5,
                    depth_hz: 200.0,
                }),
            },
        );
        assert!(shaped.left.iter().all(|s| s.is_finite()));
        assert!(rms(&shaped.left) < rms(&raw.left));
        assert!(shaped.peak() <= raw.peak());
    }

    #[test]
    fn test_shape_without_filter_is_identity() {
        let mut rng = StdRng::seed_from_u64(5);
        let raw = generate_with(NoiseColor::Pink, SR, &mut rng);
        let mut shaped = raw.clone();
        shape(&mut shaped, &SynthParams::plain(NoiseColor::Pink));
        assert_eq!(raw, shaped);
    }
}
