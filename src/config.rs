use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Ok, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::core::cache::DEFAULT_CACHE_FILE;

pub const CONFIG_FILE_NAME: &str = ".wiregenrc.json";

pub const DEFAULT_OUTPUT_FILE: &str = "zz_wiregen.go";
pub const DEFAULT_RUNTIME_IMPORT: &str = "github.com/wiregen/wiregen/runtime";
pub const DEFAULT_RUNTIME_ALIAS: &str = "runtime";

pub const TEST_FILE_PATTERNS: &[&str] = &["**/*_test.go"];

/// Directories never scanned, whatever `includes` says.
pub const SKIPPED_DIRS: &[&str] = &["vendor", "testdata", "node_modules"];

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub ignores: Vec<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default = "default_ignore_test_files")]
    pub ignore_test_files: bool,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
    #[serde(default = "default_runtime_import")]
    pub runtime_import: String,
    #[serde(default = "default_runtime_alias")]
    pub runtime_alias: String,
}

fn default_ignore_test_files() -> bool {
    true
}

fn default_output_file() -> String {
    DEFAULT_OUTPUT_FILE.to_string()
}

fn default_cache_file() -> String {
    DEFAULT_CACHE_FILE.to_string()
}

fn default_runtime_import() -> String {
    DEFAULT_RUNTIME_IMPORT.to_string()
}

fn default_runtime_alias() -> String {
    DEFAULT_RUNTIME_ALIAS.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignores: Vec::new(),
            includes: Vec::new(),
            ignore_test_files: default_ignore_test_files(),
            output_file: default_output_file(),
            cache_file: default_cache_file(),
            runtime_import: default_runtime_import(),
            runtime_alias: default_runtime_alias(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    ///
    /// Returns an error if any glob patterns in `ignores` or `includes` are
    /// invalid, or if a file name setting is not a plain file name.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.ignores {
            Pattern::new(pattern)
                .with_context(|| format!("Invalid glob pattern in 'ignores': \"{}\"", pattern))?;
        }

        // Patterns without * or ? are literal directory paths.
        for pattern in &self.includes {
            if pattern.contains('*') || pattern.contains('?') {
                Pattern::new(pattern).with_context(|| {
                    format!("Invalid glob pattern in 'includes': \"{}\"", pattern)
                })?;
            }
        }

        for (field, value) in [("outputFile", &self.output_file), ("cacheFile", &self.cache_file)] {
            if value.is_empty() || value.contains(['/', '\\']) {
                anyhow::bail!("Invalid '{}': \"{}\" must be a file name", field, value);
            }
        }
        if !self.output_file.ends_with(".go") {
            anyhow::bail!(
                "Invalid 'outputFile': \"{}\" must end in .go",
                self.output_file
            );
        }
        if self.runtime_import.is_empty() || self.runtime_alias.is_empty() {
            anyhow::bail!("'runtimeImport' and 'runtimeAlias' must not be empty");
        }

        Ok(())
    }
}

pub fn default_config_json() -> Result<String> {
    let config = Config::default();
    serde_json::to_string_pretty(&config).context("Failed to generate default config.")
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if current.join(".git").exists() {
            return None;
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Result of loading configuration.
pub struct ConfigLoadResult {
    pub config: Config,
    /// True if config was loaded from a file, false if using defaults.
    pub from_file: bool,
}

pub fn load_config(start_dir: &Path) -> Result<ConfigLoadResult> {
    match find_config_file(start_dir) {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(ConfigLoadResult {
                config,
                from_file: true,
            })
        }
        None => Ok(ConfigLoadResult {
            config: Config::default(),
            from_file: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::*;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.ignores.is_empty());
        assert!(config.includes.is_empty());
        assert!(config.ignore_test_files);
        assert_eq!(config.output_file, "zz_wiregen.go");
        assert_eq!(config.cache_file, ".wiregen-cache.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let json = r#"{
              "ignores": ["**/mocks/**"],
              "includes": ["internal"],
              "outputFile": "wire_gen.go",
              "runtimeImport": "example.com/rt",
              "runtimeAlias": "rt"
          }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.ignores, vec!["**/mocks/**"]);
        assert_eq!(config.includes, vec!["internal"]);
        assert_eq!(config.output_file, "wire_gen.go");
        assert_eq!(config.runtime_import, "example.com/rt");
        assert_eq!(config.runtime_alias, "rt");
        assert_eq!(config.cache_file, DEFAULT_CACHE_FILE);
    }

    #[test]
    fn test_find_config_file() {
        let dir = tempdir().unwrap();
        let sub_dir = dir.path().join("internal").join("users");
        fs::create_dir_all(&sub_dir).unwrap();

        let config_path = dir.path().join(CONFIG_FILE_NAME);
        File::create(&config_path).unwrap();

        let found = find_config_file(&sub_dir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let found = find_config_file(dir.path());
        assert!(found.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        fs::write(&config_path, r#"{ "ignoreTestFiles": false }"#).unwrap();

        let result = load_config(dir.path()).unwrap();
        assert!(result.from_file);
        assert!(!result.config.ignore_test_files);
    }

    #[test]
    fn test_load_config_default_when_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let result = load_config(dir.path()).unwrap();
        assert!(!result.from_file);
        assert_eq!(result.config.output_file, DEFAULT_OUTPUT_FILE);
    }

    #[test]
    fn test_validate_invalid_ignore_pattern() {
        let config = Config {
            ignores: vec!["[invalid".to_string()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ignores"));
    }

    #[test]
    fn test_validate_invalid_include_pattern() {
        let config = Config {
            includes: vec!["pkg/**/[invalid".to_string()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("includes"));
    }

    #[test]
    fn test_validate_output_file() {
        let nested = Config {
            output_file: "gen/zz.go".to_string(),
            ..Default::default()
        };
        assert!(nested.validate().is_err());

        let not_go = Config {
            output_file: "zz_wiregen.txt".to_string(),
            ..Default::default()
        };
        assert!(not_go.validate().unwrap_err().to_string().contains(".go"));
    }

    #[test]
    fn test_load_config_with_invalid_pattern_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "ignores": ["[invalid"] }"#).unwrap();

        assert!(load_config(dir.path()).is_err());
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let json = default_config_json().unwrap();
        assert!(json.contains("\"ignoreTestFiles\": true"));
        assert!(json.contains("\"runtimeImport\""));
        assert!(!json.contains("runtime_import"));
    }
}
