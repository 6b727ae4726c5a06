//! Playback backends for Nocturne.
//!
//! Everything that actually produces or forwards audio lives here: the
//! `AudioPort` capability trait, the in-process synth mixer and its cpal
//! output, the background-service port, the noise synthesizer and the
//! bridge packet mapper. Reconciliation logic does not; see `nocturne-core`.

pub mod bridge;
pub mod noise;
pub mod output;
pub mod platform;
pub mod port;
pub mod service;
pub mod synth;

pub use bridge::{packet_for, to_packet, BridgePacket, PacketKind};
pub use noise::StereoBuffer;
pub use output::{default_sample_rate, OutputStream};
pub use platform::{build_port, detect, BackendKind, SelectedBackend};
pub use port::{AudioPort, NullPort, PortError, PortOp, PortResult, ServiceStatus, TestPort};
pub use service::{LoopbackService, ServicePort, ServiceRequest, ServiceTransport};
pub use synth::{Mixer, SynthPort};
