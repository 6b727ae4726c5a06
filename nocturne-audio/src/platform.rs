//! Backend selection. Exactly one port owns audio output per process; the
//! choice is made once at startup and never renegotiated.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::port::{AudioPort, NullPort};
use crate::service::{LoopbackService, ServicePort};
use crate::synth::{Mixer, SynthPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pick by platform.
    #[default]
    Auto,
    Synth,
    Service,
    Null,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(BackendKind::Auto),
            "synth" => Some(BackendKind::Synth),
            "service" => Some(BackendKind::Service),
            "null" | "none" => Some(BackendKind::Null),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::Synth => "synth",
            BackendKind::Service => "service",
            BackendKind::Null => "null",
        }
    }

    /// Resolve `Auto` for the platform this binary was built for.
    pub fn resolve(self) -> Self {
        match self {
            BackendKind::Auto => detect(),
            other => other,
        }
    }
}

/// Android plays through a background service so audio and the
/// countdown outlive a suspended app; everything else synthesizes in-process.
pub fn detect() -> BackendKind {
    if cfg!(target_os = "android") {
        BackendKind::Service
    } else {
        BackendKind::Synth
    }
}

/// The port chosen at startup, plus the synth mixer when there is one so the
/// host can attach an output stream.
pub struct SelectedBackend {
    pub kind: BackendKind,
    pub port: Arc<dyn AudioPort>,
    pub mixer: Option<Arc<Mutex<Mixer>>>,
}

pub fn build_port(kind: BackendKind, sample_rate: u32, asset_root: impl Into<PathBuf>) -> SelectedBackend {
    let kind = kind.resolve();
    log::info!(target: "backend", "using {} backend", kind.as_str());
    match kind {
        BackendKind::Synth => {
            let synth = SynthPort::new(sample_rate, asset_root);
            let mixer = synth.mixer();
            SelectedBackend {
                kind,
                port: Arc::new(synth),
                mixer: Some(mixer),
            }
        }
        BackendKind::Service => SelectedBackend {
            kind,
            port: Arc::new(ServicePort::new(LoopbackService::new())),
            mixer: None,
        },
        BackendKind::Null | BackendKind::Auto => SelectedBackend {
            kind: BackendKind::Null,
            port: Arc::new(NullPort),
            mixer: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(BackendKind::parse("Synth"), Some(BackendKind::Synth));
        assert_eq!(BackendKind::parse("none"), Some(BackendKind::Null));
        assert_eq!(BackendKind::parse("jack"), None);
    }

    #[test]
    fn test_auto_resolves_to_concrete_kind() {
        let resolved = BackendKind::Auto.resolve();
        assert_ne!(resolved, BackendKind::Auto);
        #[cfg(not(target_os = "android"))]
        assert_eq!(resolved, BackendKind::Synth);
    }

    #[test]
    fn test_build_exactly_one_port() {
        let synth = build_port(BackendKind::Synth, 8_000, "assets");
        assert_eq!(synth.port.name(), "synth");
        assert!(synth.mixer.is_some());

        let service = build_port(BackendKind::Service, 8_000, "assets");
        assert_eq!(service.port.name(), "service");
        assert!(service.mixer.is_none());
        assert!(service.port.service_status().unwrap().is_some());

        let null = build_port(BackendKind::Null, 8_000, "assets");
        assert_eq!(null.port.name(), "null");
    }
}
