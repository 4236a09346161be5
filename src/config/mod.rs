//! Configuration system (layered: defaults < config file < environment).

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::Deserialize;
use tracing::warn;

use crate::protocol::Protocol;

/// Global default config (lazy-initialized from file + env).
static DEFAULT_CONFIG: OnceLock<NormalizerConfig> = OnceLock::new();

/// Runtime configuration for the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Directory where decoded images are written.
    pub image_dir: PathBuf,
    /// Treat every run as this protocol instead of classifying per chunk.
    pub forced_protocol: Option<Protocol>,
    /// Whether finalization triggers the container-file download side effect.
    pub fetch_files: bool,
}

/// On-disk layer (`config.toml` in the platform config dir).
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    image_dir: Option<PathBuf>,
    protocol: Option<String>,
    fetch_files: Option<bool>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            forced_protocol: None,
            fetch_files: true,
        }
    }
}

fn default_image_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "estuary")
        .map(|dirs| dirs.data_dir().join("images"))
        .unwrap_or_else(std::env::temp_dir)
}

fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "estuary")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl NormalizerConfig {
    /// Load the full layered config: defaults, then the config file, then
    /// environment variables (`ESTUARY_IMAGE_DIR`, `ESTUARY_PROTOCOL`,
    /// `ESTUARY_FETCH_FILES`).
    pub fn load() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        if let Some(path) = config_file_path() {
            if let Ok(raw) = std::fs::read_to_string(&path) {
                match toml::from_str::<ConfigFile>(&raw) {
                    Ok(file) => config.apply_file(file),
                    Err(e) => warn!(path = %path.display(), error = %e, "ignoring malformed config file"),
                }
            }
        }
        config.apply_env();
        config
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static NormalizerConfig {
        DEFAULT_CONFIG.get_or_init(Self::load)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(dir) = file.image_dir {
            self.image_dir = dir;
        }
        if let Some(ref name) = file.protocol {
            self.set_protocol(name);
        }
        if let Some(fetch) = file.fetch_files {
            self.fetch_files = fetch;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("ESTUARY_IMAGE_DIR") {
            self.image_dir = PathBuf::from(dir);
        }
        if let Ok(name) = std::env::var("ESTUARY_PROTOCOL") {
            self.set_protocol(&name);
        }
        if let Ok(fetch) = std::env::var("ESTUARY_FETCH_FILES") {
            self.fetch_files = matches!(fetch.as_str(), "1" | "true" | "yes");
        }
    }

    fn set_protocol(&mut self, name: &str) {
        match Protocol::from_str(name) {
            Ok(protocol) => self.forced_protocol = Some(protocol),
            Err(_) => warn!(name, "unknown protocol name in config, ignoring"),
        }
    }
}
