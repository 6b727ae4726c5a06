//! Sound descriptors: the immutable catalog entries the registry hands out.

use serde::{Deserialize, Serialize};

use crate::SoundId;

/// Catalog grouping for a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Rain,
    Thunder,
    Waterways,
    Ocean,
    Forest,
    Creatures,
    Fire,
    ColorNoise,
    Ambient,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Rain,
        Category::Thunder,
        Category::Waterways,
        Category::Ocean,
        Category::Forest,
        Category::Creatures,
        Category::Fire,
        Category::ColorNoise,
        Category::Ambient,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Rain => "rain",
            Category::Thunder => "thunder",
            Category::Waterways => "waterways",
            Category::Ocean => "ocean",
            Category::Forest => "forest",
            Category::Creatures => "creatures",
            Category::Fire => "fire",
            Category::ColorNoise => "color-noise",
            Category::Ambient => "ambient",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Spectral color of a generated noise loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    pub fn as_str(self) -> &'static str {
        match self {
            NoiseColor::White => "white",
            NoiseColor::Pink => "pink",
            NoiseColor::Brown => "brown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "white" => Some(NoiseColor::White),
            "pink" => Some(NoiseColor::Pink),
            "brown" => Some(NoiseColor::Brown),
            _ => None,
        }
    }
}

/// Low-pass filter applied after noise generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub cutoff_hz: f32,
}

/// Slow sinusoidal sweep of the filter cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulation {
    pub rate_hz: f32,
    pub depth_hz: f32,
}

/// Parameters for a synthetic (generated) sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthParams {
    pub color: NoiseColor,
    pub filter: Option<FilterSpec>,
    pub modulation: Option<Modulation>,
}

impl SynthParams {
    pub const fn plain(color: NoiseColor) -> Self {
        Self {
            color,
            filter: None,
            modulation: None,
        }
    }
}

/// Where a sound's audio comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoundSource {
    /// Pre-recorded loop addressed by a resource locator.
    File { locator: &'static str },
    /// Generated at runtime by the noise synthesizer.
    Synthetic(SynthParams),
}

/// Static catalog entry for one sound.
///
/// `name` is presentation data only; nothing on the playback path reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub source: SoundSource,
}

impl SoundDescriptor {
    pub fn sound_id(&self) -> SoundId {
        SoundId::new(self.id)
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, SoundSource::Synthetic(_))
    }

    /// Wire name of the source kind: `"file"` or `"synthetic"`.
    pub fn kind_str(&self) -> &'static str {
        match self.source {
            SoundSource::File { .. } => "file",
            SoundSource::Synthetic(_) => "synthetic",
        }
    }

    pub fn synth_params(&self) -> Option<&SynthParams> {
        match &self.source {
            SoundSource::Synthetic(params) => Some(params),
            SoundSource::File { .. } => None,
        }
    }
}
