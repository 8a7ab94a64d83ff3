use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::builder::DEFAULT_STACK_TRACE_DEPTH;
use crate::sections::Section;
use crate::system::host::DEFAULT_SEARCH_PATH_VAR;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub snapshot: SnapshotConfig,
    pub host: HostConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub sections: Vec<Section>,
    pub stack_trace_depth: usize,
    pub include_pools: bool,
    pub pretty: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            sections: Section::FULL_ORDER.to_vec(),
            stack_trace_depth: DEFAULT_STACK_TRACE_DEPTH,
            include_pools: false,
            pretty: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub search_path_var: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            search_path_var: DEFAULT_SEARCH_PATH_VAR.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "warn".to_string(),
            json: false,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rtsnap").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.snapshot.sections, Section::FULL_ORDER.to_vec());
        assert_eq!(config.snapshot.stack_trace_depth, 5);
        assert!(!config.snapshot.include_pools);
        assert!(config.snapshot.pretty);
        assert_eq!(config.host.search_path_var, "PATH");
        assert_eq!(config.logging.level, "warn");
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[snapshot]
stack_trace_depth = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.snapshot.stack_trace_depth, 0);
        // Other fields should be defaults
        assert!(config.snapshot.pretty);
        assert_eq!(config.host.search_path_var, "PATH");
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[snapshot]
sections = ["class-loading", "runtime"]
stack_trace_depth = 12
include_pools = true
pretty = false

[host]
search_path_var = "LD_LIBRARY_PATH"

[logging]
level = "debug"
json = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.snapshot.sections,
            vec![Section::ClassLoading, Section::Runtime]
        );
        assert_eq!(config.snapshot.stack_trace_depth, 12);
        assert!(config.snapshot.include_pools);
        assert!(!config.snapshot.pretty);
        assert_eq!(config.host.search_path_var, "LD_LIBRARY_PATH");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn unknown_section_name_is_rejected() {
        let toml_str = r#"
[snapshot]
sections = ["gc"]
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.snapshot.stack_trace_depth, 5);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("rtsnap_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.snapshot.stack_trace_depth, 5);
        let _ = std::fs::remove_file(&temp);
    }
}
