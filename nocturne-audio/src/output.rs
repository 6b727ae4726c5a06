//! Audio output via cpal: pulls frames from the synth mixer.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::synth::Mixer;

/// Sample rate of the default output device, if there is one.
pub fn default_sample_rate() -> Option<u32> {
    let device = cpal::default_host().default_output_device()?;
    device.default_output_config().ok().map(|c| c.sample_rate().0)
}

/// A running output stream. Audio stops when this is dropped.
pub struct OutputStream {
    stream: Stream,
    sample_rate: u32,
    channels: u16,
}

impl OutputStream {
    /// Open the default output device and start rendering `mixer` into it.
    pub fn open(mixer: Arc<Mutex<Mixer>>) -> Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "No output device available".to_string())?;
        let config = device
            .default_output_config()
            .map_err(|e| format!("Failed to get output config: {}", e))?;
        if config.sample_format() != SampleFormat::F32 {
            return Err(format!(
                "Unsupported output sample format: {:?}",
                config.sample_format()
            ));
        }

        let channels = config.channels();
        let sample_rate = config.sample_rate().0;
        let stream_config: StreamConfig = config.into();

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut mixer) = mixer.lock() {
                        mixer.render(data, usize::from(channels));
                    } else {
                        data.fill(0.0);
                    }
                },
                |err| {
                    log::error!(target: "backend", "Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("Failed to build output stream: {}", e))?;
        stream
            .play()
            .map_err(|e| format!("Failed to start output stream: {}", e))?;

        log::info!(
            target: "backend",
            "Output stream open: {} Hz, {} channels",
            sample_rate,
            channels
        );
        Ok(Self {
            stream,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
