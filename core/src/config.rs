use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::env;

pub const DEFAULT_LEAK_POINT_LIMIT: usize = 5;
pub const DEFAULT_READ_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AnalysisSection {
    /// Maximum leak-point candidates and per-node child bound.
    pub limit: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct IngestionSection {
    pub read_buffer_bytes: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HeapscopeConfig {
    pub analysis: AnalysisSection,
    pub ingestion: IngestionSection,
}

impl Default for HeapscopeConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisSection {
                limit: DEFAULT_LEAK_POINT_LIMIT,
            },
            ingestion: IngestionSection {
                read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            },
        }
    }
}

impl HeapscopeConfig {
    /// Layers built-in defaults, `config/default`, `config/{RUN_MODE}` and
    /// `HEAPSCOPE__*` environment variables, later sources winning.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("HEAPSCOPE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        with_defaults(Config::builder())?
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("analysis.limit", DEFAULT_LEAK_POINT_LIMIT as i64)?
        .set_default("ingestion.read_buffer_bytes", DEFAULT_READ_BUFFER_BYTES as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_yields_defaults() {
        let cfg = HeapscopeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, HeapscopeConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let cfg = HeapscopeConfig::from_toml_str("[analysis]\nlimit = 12\n").unwrap();
        assert_eq!(cfg.analysis.limit, 12);
        assert_eq!(cfg.ingestion.read_buffer_bytes, DEFAULT_READ_BUFFER_BYTES);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let result = HeapscopeConfig::from_toml_str("[analysis]\nlimit = \"many\"\n");
        assert!(result.is_err());
    }
}
