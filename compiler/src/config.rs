// config.rs — Lowering options and the runtime symbol surface
//
// Options are plain serde structs so they can be loaded from a JSON file
// (`pfc --runtime-config`) and hashed canonically for build provenance.
// Every field has a default; a config file only lists what it overrides.
//
// Failure modes: unreadable file or malformed JSON produce `ConfigError`.
// Side effects: `load` reads one file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names of the runtime entry points the lowered IR calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSymbols {
    /// Abstract semaphore constructor; eliminated by `init_semaphores`.
    pub make_semaphore: String,
    /// `int init(semaphore*, int initial_count)`
    pub semaphore_init: String,
    /// `int release(semaphore*, int n)`
    pub semaphore_release: String,
    /// Stack allocation intrinsic.
    pub alloca: String,
    /// Storage size of one runtime semaphore.
    pub semaphore_size_bytes: i64,
}

impl Default for RuntimeSymbols {
    fn default() -> Self {
        Self {
            make_semaphore: "pf_make_semaphore".to_string(),
            semaphore_init: "pf_semaphore_init".to_string(),
            semaphore_release: "pf_semaphore_release".to_string(),
            alloca: "alloca".to_string(),
            semaphore_size_bytes: 16,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    pub runtime: RuntimeSymbols,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: invalid runtime config: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl LowerOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Compact JSON with fields in declaration order, used for fingerprints.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let opts = LowerOptions::from_json("{}").unwrap();
        assert_eq!(opts, LowerOptions::default());
        assert_eq!(opts.runtime.semaphore_release, "pf_semaphore_release");
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let opts =
            LowerOptions::from_json(r#"{"runtime": {"semaphore_size_bytes": 32}}"#).unwrap();
        assert_eq!(opts.runtime.semaphore_size_bytes, 32);
        assert_eq!(opts.runtime.alloca, "alloca");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(LowerOptions::from_json(r#"{"runtime": 3}"#).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = LowerOptions::load(Path::new("/nonexistent/pfc-runtime.json")).unwrap_err();
        assert!(err.to_string().starts_with("/nonexistent/pfc-runtime.json"));
    }

    #[test]
    fn canonical_json_is_stable() {
        let a = LowerOptions::default().canonical_json();
        let b = LowerOptions::default().canonical_json();
        assert_eq!(a, b);
        assert!(a.starts_with(r#"{"runtime":{"make_semaphore":"pf_make_semaphore""#));
    }
}
