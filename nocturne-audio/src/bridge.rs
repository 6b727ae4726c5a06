//! Descriptor → bridge packet: the minimal shape an external playback host
//! needs to start a sound. Presentation data (display names) is stripped.

use serde::{Deserialize, Serialize};

use nocturne_types::{SoundDescriptor, SoundRegistry, SoundSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    File,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePacket {
    pub sound_id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: PacketKind,
}

pub const SYNTHETIC_SCHEME: &str = "synthetic://";

pub fn to_packet(descriptor: &SoundDescriptor) -> BridgePacket {
    let (url, kind) = match &descriptor.source {
        SoundSource::File { locator } => (resolve_locator(locator), PacketKind::File),
        SoundSource::Synthetic(params) => (
            format!("{SYNTHETIC_SCHEME}{}", params.color.as_str()),
            PacketKind::Synthetic,
        ),
    };
    BridgePacket {
        sound_id: descriptor.id.to_string(),
        url,
        kind,
    }
}

/// Packet for a catalog id, or `None` if the registry does not know it.
pub fn packet_for(registry: &SoundRegistry, id: &str) -> Option<BridgePacket> {
    registry.get(id).map(to_packet)
}

/// Absolute and remote locators pass through; relative ones are rooted.
fn resolve_locator(locator: &str) -> String {
    if locator.starts_with("http") || locator.starts_with('/') {
        locator.to_string()
    } else {
        format!("/{locator}")
    }
}
