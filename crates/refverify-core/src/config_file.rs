use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Config;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub services: Option<ServicesConfig>,
    pub pipeline: Option<PipelineConfig>,
    pub thresholds: Option<ThresholdsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub grobid_url: Option<String>,
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub num_workers: Option<usize>,
    pub lookup_timeout_secs: Option<u64>,
    pub lookup_attempts: Option<u32>,
    pub adjudication_batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub similarity: Option<f64>,
    pub suspicion_floor: Option<f64>,
    pub ambiguity_gap: Option<f64>,
}

/// Platform config directory path: `<config_dir>/refverify/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("refverify").join("config.toml"))
}

/// Load config by cascading CWD `.refverify.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".refverify.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        services: Some(ServicesConfig {
            grobid_url: overlay
                .services
                .as_ref()
                .and_then(|s| s.grobid_url.clone())
                .or_else(|| base.services.as_ref().and_then(|s| s.grobid_url.clone())),
            gemini_api_key: overlay
                .services
                .as_ref()
                .and_then(|s| s.gemini_api_key.clone())
                .or_else(|| base.services.as_ref().and_then(|s| s.gemini_api_key.clone())),
        }),
        pipeline: Some(PipelineConfig {
            num_workers: overlay
                .pipeline
                .as_ref()
                .and_then(|p| p.num_workers)
                .or_else(|| base.pipeline.as_ref().and_then(|p| p.num_workers)),
            lookup_timeout_secs: overlay
                .pipeline
                .as_ref()
                .and_then(|p| p.lookup_timeout_secs)
                .or_else(|| base.pipeline.as_ref().and_then(|p| p.lookup_timeout_secs)),
            lookup_attempts: overlay
                .pipeline
                .as_ref()
                .and_then(|p| p.lookup_attempts)
                .or_else(|| base.pipeline.as_ref().and_then(|p| p.lookup_attempts)),
            adjudication_batch_size: overlay
                .pipeline
                .as_ref()
                .and_then(|p| p.adjudication_batch_size)
                .or_else(|| {
                    base.pipeline
                        .as_ref()
                        .and_then(|p| p.adjudication_batch_size)
                }),
        }),
        thresholds: Some(ThresholdsConfig {
            similarity: overlay
                .thresholds
                .as_ref()
                .and_then(|t| t.similarity)
                .or_else(|| base.thresholds.as_ref().and_then(|t| t.similarity)),
            suspicion_floor: overlay
                .thresholds
                .as_ref()
                .and_then(|t| t.suspicion_floor)
                .or_else(|| base.thresholds.as_ref().and_then(|t| t.suspicion_floor)),
            ambiguity_gap: overlay
                .thresholds
                .as_ref()
                .and_then(|t| t.ambiguity_gap)
                .or_else(|| base.thresholds.as_ref().and_then(|t| t.ambiguity_gap)),
        }),
    }
}

impl ConfigFile {
    /// Apply file values over a runtime [`Config`]. File values win over
    /// the defaults already in `config`; absent values leave it alone.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(pipeline) = &self.pipeline {
            if let Some(n) = pipeline.num_workers {
                config.num_workers = n;
            }
            if let Some(secs) = pipeline.lookup_timeout_secs {
                config.lookup_timeout = std::time::Duration::from_secs(secs);
            }
            if let Some(attempts) = pipeline.lookup_attempts {
                config.lookup_attempts = attempts;
            }
            if let Some(size) = pipeline.adjudication_batch_size {
                config.adjudication_batch_size = size;
            }
        }
        if let Some(thresholds) = &self.thresholds {
            if let Some(v) = thresholds.similarity {
                config.thresholds.similarity = v;
            }
            if let Some(v) = thresholds.suspicion_floor {
                config.thresholds.suspicion_floor = v;
            }
            if let Some(v) = thresholds.ambiguity_gap {
                config.thresholds.ambiguity_gap = v;
            }
        }
    }
}
