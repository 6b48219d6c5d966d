//! # Debug Artifacts
//!
//! A [`DebugSink`] receives intermediate payloads (components, plans, store
//! batches) under a label such as `"plans/ALL_WIND"`. The first path segment
//! is the artifact kind.
//!
//! Sinks never influence the computation: recording failures are logged and
//! swallowed, and [`NoopSink`] can replace any sink without changing results.
//! Callers check [`DebugSink::enabled`] before building expensive payloads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{LoadError, LoadResult};
use crate::file_io::write_json_atomic;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]+").expect("label pattern is valid"));

/// Receiver for intermediate payloads
pub trait DebugSink {
    /// Whether payloads are kept at all
    fn enabled(&self) -> bool;

    /// Record a payload under `label` (`"<kind>/<name>"` or just `"<name>"`)
    fn record(&self, label: &str, payload: &Value);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn enabled(&self) -> bool {
        false
    }

    fn record(&self, _label: &str, _payload: &Value) {}
}

/// Sink that emits each payload as a `debug!` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::DEBUG)
    }

    fn record(&self, label: &str, payload: &Value) {
        tracing::debug!(label, payload = %payload, "debug artifact");
    }
}

/// Replace every run of characters outside `[A-Za-z0-9_.-]` with `_`
pub fn sanitize_label(label: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(label.trim(), "_");
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.into_owned()
    }
}

/// One file written by a [`JsonDirSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub kind: String,
    pub label: String,
    /// Relative to the run directory
    pub path: String,
    pub recorded_at: DateTime<Utc>,
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub run_label: String,
    pub created_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactEntry>,
}

/// Run-scoped artifact recorder.
///
/// Creates `<base>/<YYYYmmdd_HHMMSS>_<label>/`, writes one pretty JSON file
/// per payload under `<kind>/<name>.json`, and keeps `manifest.json` up to
/// date after every artifact.
pub struct JsonDirSink {
    run_dir: PathBuf,
    manifest: Mutex<Manifest>,
}

impl JsonDirSink {
    pub fn create(base_dir: &Path, run_label: &str) -> LoadResult<Self> {
        let run_id = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let run_dir = base_dir.join(format!("{}_{}", run_id, sanitize_label(run_label)));
        fs::create_dir_all(&run_dir).map_err(|e| {
            LoadError::file_error(
                "create debug dir",
                run_dir.display().to_string(),
                e.to_string(),
            )
        })?;

        let manifest = Manifest {
            run_id,
            run_label: run_label.to_string(),
            created_at: Utc::now(),
            artifacts: Vec::new(),
        };
        write_json_atomic(&manifest, &run_dir.join("manifest.json"))?;
        tracing::info!(dir = %run_dir.display(), "debug artifacts enabled");

        Ok(JsonDirSink {
            run_dir,
            manifest: Mutex::new(manifest),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Snapshot of the manifest
    pub fn manifest(&self) -> Manifest {
        self.manifest.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn write_artifact(&self, label: &str, payload: &Value) -> LoadResult<()> {
        let (kind, name) = match label.split_once('/') {
            Some((kind, name)) => (sanitize_label(kind), sanitize_label(name)),
            None => ("misc".to_string(), sanitize_label(label)),
        };

        let mut manifest = self.manifest.lock().unwrap_or_else(|p| p.into_inner());

        let dir = self.run_dir.join(&kind);
        fs::create_dir_all(&dir).map_err(|e| {
            LoadError::file_error("create debug dir", dir.display().to_string(), e.to_string())
        })?;

        let mut file_name = format!("{}.json", name);
        let mut n = 1;
        while dir.join(&file_name).exists() {
            n += 1;
            file_name = format!("{}_{}.json", name, n);
        }

        write_json_atomic(payload, &dir.join(&file_name))?;

        manifest.artifacts.push(ArtifactEntry {
            kind: kind.clone(),
            label: label.to_string(),
            path: format!("{}/{}", kind, file_name),
            recorded_at: Utc::now(),
        });
        write_json_atomic(&*manifest, &self.run_dir.join("manifest.json"))
    }
}

impl DebugSink for JsonDirSink {
    fn enabled(&self) -> bool {
        true
    }

    fn record(&self, label: &str, payload: &Value) {
        if let Err(e) = self.write_artifact(label, payload) {
            tracing::warn!(label, error = %e, "failed to write debug artifact");
        }
    }
}
