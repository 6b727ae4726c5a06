//! In-process backend: a small voice mixer fed by the noise synthesizer and
//! pre-rendered WAV loops.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nocturne_types::{SoundId, SoundRegistry, SoundSource};

use crate::noise::{self, StereoBuffer};
use crate::port::{AudioPort, PortError, PortResult, ServiceStatus};

/// Gain changes are spread over this long to avoid zipper noise.
const RAMP_SECONDS: f32 = 0.016;

/// Linear gain ramp.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    current: f32,
    target: f32,
    step: f32,
}

impl Ramp {
    fn at(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
        }
    }

    fn set(&mut self, target: f32, frames: usize) {
        self.target = target;
        self.step = if frames == 0 {
            self.current = target;
            0.0
        } else {
            (target - self.current) / frames as f32
        };
    }

    fn next(&mut self) -> f32 {
        if self.step != 0.0 {
            self.current += self.step;
            let done = (self.step > 0.0 && self.current >= self.target)
                || (self.step < 0.0 && self.current <= self.target);
            if done {
                self.current = self.target;
                self.step = 0.0;
            }
        }
        self.current
    }

    fn settled(&self) -> bool {
        self.step == 0.0
    }
}

struct Voice {
    buffer: Arc<StereoBuffer>,
    position: f64,
    increment: f64,
    gain: Ramp,
    stopping: bool,
}

impl Voice {
    fn next_frame(&mut self) -> (f32, f32) {
        let frames = self.buffer.frames();
        if frames == 0 {
            return (0.0, 0.0);
        }
        let idx = self.position as usize % frames;
        let next = (idx + 1) % frames;
        let frac = (self.position - self.position.floor()) as f32;
        let l = self.buffer.left[idx] + (self.buffer.left[next] - self.buffer.left[idx]) * frac;
        let r = self.buffer.right[idx] + (self.buffer.right[next] - self.buffer.right[idx]) * frac;
        self.position += self.increment;
        if self.position >= frames as f64 {
            self.position -= frames as f64;
        }
        (l, r)
    }
}

/// Sums voices into interleaved output frames.
pub struct Mixer {
    sample_rate: u32,
    ramp_frames: usize,
    voices: BTreeMap<SoundId, Voice>,
    master: Ramp,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ramp_frames: (RAMP_SECONDS * sample_rate as f32) as usize,
            voices: BTreeMap::new(),
            master: Ramp::at(1.0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start a voice, or retarget it if one is already sounding for `id`.
    pub fn play(&mut self, id: &SoundId, buffer: Arc<StereoBuffer>, gain: f32) {
        let ramp_frames = self.ramp_frames;
        if let Some(voice) = self.voices.get_mut(id) {
            voice.stopping = false;
            voice.gain.set(gain, ramp_frames);
            return;
        }
        let increment = if self.sample_rate == 0 {
            1.0
        } else {
            f64::from(buffer.sample_rate) / f64::from(self.sample_rate)
        };
        let mut ramp = Ramp::at(0.0);
        ramp.set(gain, ramp_frames);
        self.voices.insert(
            id.clone(),
            Voice {
                buffer,
                position: 0.0,
                increment,
                gain: ramp,
                stopping: false,
            },
        );
    }

    /// Returns false when no voice is sounding for `id`.
    pub fn set_gain(&mut self, id: &SoundId, gain: f32) -> bool {
        let ramp_frames = self.ramp_frames;
        match self.voices.get_mut(id) {
            Some(voice) if !voice.stopping => {
                voice.gain.set(gain, ramp_frames);
                true
            }
            _ => false,
        }
    }

    /// Fade a voice out; it is dropped once silent.
    pub fn stop(&mut self, id: &SoundId) {
        let ramp_frames = self.ramp_frames;
        if let Some(voice) = self.voices.get_mut(id) {
            voice.stopping = true;
            voice.gain.set(0.0, ramp_frames);
        }
    }

    pub fn stop_all(&mut self) {
        let ids: Vec<SoundId> = self.voices.keys().cloned().collect();
        for id in &ids {
            self.stop(id);
        }
    }

    pub fn set_master(&mut self, gain: f32) {
        let ramp_frames = self.ramp_frames;
        self.master.set(gain, ramp_frames);
    }

    /// Ids of voices that are sounding and not fading out.
    pub fn active(&self) -> Vec<SoundId> {
        self.voices
            .iter()
            .filter(|(_, v)| !v.stopping)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn target_gain(&self, id: &SoundId) -> Option<f32> {
        self.voices
            .get(id)
            .filter(|v| !v.stopping)
            .map(|v| v.gain.target)
    }

    /// Fill `out` with interleaved frames of `channels` channels.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in out.chunks_mut(channels) {
            let (mut l, mut r) = (0.0_f32, 0.0_f32);
            for voice in self.voices.values_mut() {
                let gain = voice.gain.next();
                let (vl, vr) = voice.next_frame();
                l += vl * gain;
                r += vr * gain;
            }
            let master = self.master.next();
            l *= master;
            r *= master;
            match frame {
                [mono] => *mono = (l + r) * 0.5,
                [left, right, rest @ ..] => {
                    *left = l;
                    *right = r;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
        self.voices
            .retain(|_, v| !(v.stopping && v.gain.settled() && v.gain.current == 0.0));
    }
}

/// `AudioPort` over the in-process mixer.
pub struct SynthPort {
    mixer: Arc<Mutex<Mixer>>,
    registry: SoundRegistry,
    asset_root: PathBuf,
    cache: Mutex<HashMap<SoundId, Arc<StereoBuffer>>>,
}

impl SynthPort {
    pub fn new(sample_rate: u32, asset_root: impl Into<PathBuf>) -> Self {
        Self {
            mixer: Arc::new(Mutex::new(Mixer::new(sample_rate))),
            registry: SoundRegistry::new(),
            asset_root: asset_root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Shared mixer, for an output stream to pull from.
    pub fn mixer(&self) -> Arc<Mutex<Mixer>> {
        Arc::clone(&self.mixer)
    }

    pub fn active_voices(&self) -> Vec<SoundId> {
        self.lock_mixer().active()
    }

    fn lock_mixer(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn buffer_for(&self, id: &SoundId) -> PortResult<Arc<StereoBuffer>> {
        if let Some(buffer) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(Arc::clone(buffer));
        }

        let descriptor = self
            .registry
            .get(id.as_str())
            .ok_or_else(|| PortError(format!("unknown sound: {id}")))?;
        let sample_rate = self.lock_mixer().sample_rate();
        let buffer = match &descriptor.source {
            SoundSource::Synthetic(params) => noise::render(params, sample_rate),
            SoundSource::File { locator } => {
                let stem = Path::new(locator)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(descriptor.id);
                load_wav(&self.asset_root.join(format!("{stem}.wav")))?
            }
        };
        log::debug!(
            target: "backend",
            "loaded {} ({} frames @ {} Hz)",
            id,
            buffer.frames(),
            buffer.sample_rate
        );

        let buffer = Arc::new(buffer);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::clone(&buffer));
        Ok(buffer)
    }
}

impl AudioPort for SynthPort {
    fn play_sound(&self, id: &SoundId, volume: f32) -> PortResult {
        let buffer = self.buffer_for(id)?;
        self.lock_mixer().play(id, buffer, volume.clamp(0.0, 1.0));
        Ok(())
    }

    fn stop_sound(&self, id: &SoundId) -> PortResult {
        self.lock_mixer().stop(id);
        Ok(())
    }

    fn set_volume(&self, id: &SoundId, volume: f32) -> PortResult {
        if self.lock_mixer().set_gain(id, volume.clamp(0.0, 1.0)) {
            Ok(())
        } else {
            Err(PortError(format!("no voice playing for {id}")))
        }
    }

    fn stop_all(&self) -> PortResult {
        self.lock_mixer().stop_all();
        Ok(())
    }

    fn set_master_volume(&self, volume: f32) -> PortResult {
        self.lock_mixer().set_master(volume.clamp(0.0, 1.0));
        Ok(())
    }

    fn service_status(&self) -> PortResult<Option<ServiceStatus>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "synth"
    }
}

/// Read a WAV loop into a stereo buffer. Mono is duplicated to both sides.
pub fn load_wav(path: &Path) -> PortResult<StereoBuffer> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| PortError(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader.into_samples::<f32>().filter_map(|s| s.ok()).collect(),
    };

    let frames = samples.len() / channels;
    let mut buffer = StereoBuffer::silent(spec.sample_rate, frames);
    for (i, frame) in samples.chunks_exact(channels).enumerate() {
        buffer.left[i] = frame[0];
        buffer.right[i] = if channels > 1 { frame[1] } else { frame[0] };
    }
    Ok(buffer)
}
