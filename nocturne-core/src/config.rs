use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use nocturne_audio::BackendKind;
use nocturne_types::{DEFAULT_VOLUME, MAX_TIMER_SECONDS, MAX_VOLUME};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    mix: MixConfig,
    #[serde(default)]
    timer: TimerConfig,
    #[serde(default)]
    backend: BackendConfig,
    #[serde(default)]
    lifecycle: LifecycleConfig,
}

#[derive(Deserialize, Default)]
struct MixConfig {
    default_volume: Option<u8>,
    master_volume: Option<u8>,
}

#[derive(Deserialize, Default)]
struct TimerConfig {
    default_seconds: Option<u32>,
    fade_out_seconds: Option<u32>,
    auto_start_on_add: Option<bool>,
}

#[derive(Deserialize, Default)]
struct BackendConfig {
    kind: Option<String>,
    sample_rate: Option<u32>,
    asset_root: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct LifecycleConfig {
    shutdown_grace_ms: Option<u64>,
}

pub struct Config {
    mix: MixConfig,
    timer: TimerConfig,
    backend: BackendConfig,
    lifecycle: LifecycleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(embedded())
    }
}

impl Config {
    /// Embedded defaults, overridden key by key from the user's config file.
    pub fn load() -> Self {
        let mut base = embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Self::from_file(base)
    }

    /// Parse a document and merge it over the embedded defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let user = toml::from_str::<ConfigFile>(contents)?;
        let mut base = embedded();
        merge(&mut base, user);
        Ok(Self::from_file(base))
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            mix: file.mix,
            timer: file.timer,
            backend: file.backend,
            lifecycle: file.lifecycle,
        }
    }

    /// Volume a newly added sound starts at (0..=100).
    pub fn default_volume(&self) -> u8 {
        self.mix.default_volume.unwrap_or(DEFAULT_VOLUME).min(MAX_VOLUME)
    }

    pub fn master_volume(&self) -> u8 {
        self.mix.master_volume.unwrap_or(MAX_VOLUME).min(MAX_VOLUME)
    }

    /// Sleep timer length in seconds (clamped to 0..=21600).
    pub fn timer_seconds(&self) -> u32 {
        self.timer
            .default_seconds
            .unwrap_or(15 * 60)
            .min(MAX_TIMER_SECONDS)
    }

    /// Fade-out window in seconds (clamped to 0..=600).
    pub fn fade_out_seconds(&self) -> u32 {
        self.timer.fade_out_seconds.unwrap_or(30).min(600)
    }

    pub fn auto_start_on_add(&self) -> bool {
        self.timer.auto_start_on_add.unwrap_or(true)
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.backend.kind.as_deref() {
            None => BackendKind::Auto,
            Some(s) => BackendKind::parse(s).unwrap_or_else(|| {
                log::warn!(target: "config", "unknown backend kind {:?}, using auto", s);
                BackendKind::Auto
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate.unwrap_or(44_100).clamp(8_000, 192_000)
    }

    pub fn asset_root(&self) -> PathBuf {
        self.backend
            .asset_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("assets"))
    }

    /// How long teardown waits for the final stop-all (clamped to 10..=5000 ms).
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.lifecycle.shutdown_grace_ms.unwrap_or(250).clamp(10, 5_000))
    }
}

fn embedded() -> ConfigFile {
    toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
        log::error!(target: "config", "embedded config.toml is invalid: {}", e);
        ConfigFile::default()
    })
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nocturne").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    merge_mix(&mut base.mix, user.mix);
    merge_timer(&mut base.timer, user.timer);
    merge_backend(&mut base.backend, user.backend);
    if user.lifecycle.shutdown_grace_ms.is_some() {
        base.lifecycle.shutdown_grace_ms = user.lifecycle.shutdown_grace_ms;
    }
}

fn merge_mix(base: &mut MixConfig, user: MixConfig) {
    if user.default_volume.is_some() {
        base.default_volume = user.default_volume;
    }
    if user.master_volume.is_some() {
        base.master_volume = user.master_volume;
    }
}

fn merge_timer(base: &mut TimerConfig, user: TimerConfig) {
    if user.default_seconds.is_some() {
        base.default_seconds = user.default_seconds;
    }
    if user.fade_out_seconds.is_some() {
        base.fade_out_seconds = user.fade_out_seconds;
    }
    if user.auto_start_on_add.is_some() {
        base.auto_start_on_add = user.auto_start_on_add;
    }
}

fn merge_backend(base: &mut BackendConfig, user: BackendConfig) {
    if user.kind.is_some() {
        base.kind = user.kind;
    }
    if user.sample_rate.is_some() {
        base.sample_rate = user.sample_rate;
    }
    if user.asset_root.is_some() {
        base.asset_root = user.asset_root;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::default();
        assert_eq!(config.default_volume(), 50);
        assert_eq!(config.master_volume(), 100);
        assert_eq!(config.timer_seconds(), 900);
        assert_eq!(config.fade_out_seconds(), 30);
        assert!(config.auto_start_on_add());
        assert_eq!(config.backend_kind(), BackendKind::Auto);
        assert_eq!(config.sample_rate(), 44_100);
        assert_eq!(config.shutdown_grace(), Duration::from_millis(250));
    }

    #[test]
    fn test_partial_override_keeps_other_keys() {
        let config = Config::from_toml_str(
            r#"
            [timer]
            default_seconds = 1800

            [backend]
            kind = "null"
            "#,
        )
        .unwrap();
        assert_eq!(config.timer_seconds(), 1800);
        assert_eq!(config.fade_out_seconds(), 30);
        assert_eq!(config.backend_kind(), BackendKind::Null);
        assert_eq!(config.default_volume(), 50);
    }

    #[test]
    fn test_values_clamped() {
        let config = Config::from_toml_str(
            r#"
            [mix]
            default_volume = 250
            [timer]
            default_seconds = 999999
            fade_out_seconds = 5000
            [lifecycle]
            shutdown_grace_ms = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.default_volume(), 100);
        assert_eq!(config.timer_seconds(), MAX_TIMER_SECONDS);
        assert_eq!(config.fade_out_seconds(), 600);
        assert_eq!(config.shutdown_grace(), Duration::from_millis(10));
    }

    #[test]
    fn test_unknown_backend_falls_back_to_auto() {
        let config = Config::from_toml_str("[backend]\nkind = \"jack\"").unwrap();
        assert_eq!(config.backend_kind(), BackendKind::Auto);
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(Config::from_toml_str("[timer\ndefault_seconds = ").is_err());
    }
}
