//! Configuration file support for keel.
//!
//! keel supports two configuration file locations:
//! - Global: `~/.keel/config.toml` - User-wide defaults
//! - Project: `.keel/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Command-line flags
//! take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::core::table_definition::TableDefinitionCollection;

/// keel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library packaging settings
    pub library: LibraryConfig,

    /// Table schema settings
    pub schema: SchemaConfig,

    /// Localization settings
    pub localization: LocalizationConfig,
}

/// Library packaging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories searched for payload files, in order
    pub bind_paths: Vec<PathBuf>,

    /// Accept documents written by another format version
    pub suppress_version_check: bool,

    /// gzip level for library containers, 0-9
    pub compression: Option<u32>,
}

/// Table schema configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Extra table definition documents layered on the built-in schema
    pub extensions: Vec<PathBuf>,
}

/// Localization configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Cultures to report, in priority order
    pub cultures: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Library settings
        if !other.library.bind_paths.is_empty() {
            self.library.bind_paths = other.library.bind_paths;
        }
        if other.library.suppress_version_check {
            self.library.suppress_version_check = true;
        }
        if other.library.compression.is_some() {
            self.library.compression = other.library.compression;
        }

        // Schema extensions accumulate: global ones first
        self.schema.extensions.extend(other.schema.extensions);

        // Localization settings
        if !other.localization.cultures.is_empty() {
            self.localization.cultures = other.localization.cultures;
        }
    }

    /// Make relative paths relative to `base` (the directory that holds the
    /// `.keel` directory the config came from).
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in self
            .library
            .bind_paths
            .iter_mut()
            .chain(self.schema.extensions.iter_mut())
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Container compression level, clamped to 0-9.
    pub fn compression(&self) -> Compression {
        match self.library.compression {
            Some(level) => Compression::new(level.min(9)),
            None => Compression::default(),
        }
    }

    /// The built-in schema plus every configured extension.
    pub fn table_definitions(&self) -> Result<TableDefinitionCollection> {
        let mut schema =
            TableDefinitionCollection::builtin().context("failed to load built-in tables")?;
        for extension in &self.schema.extensions {
            let extra = TableDefinitionCollection::load_file(extension).with_context(|| {
                format!("failed to load table definitions: {}", extension.display())
            })?;
            schema.extend_from(&extra).with_context(|| {
                format!("conflicting table definitions in {}", extension.display())
            })?;
        }
        Ok(schema)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.keel/config.toml)
/// 2. Global config (~/.keel/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    // Load global config first
    if global_path.exists() {
        let mut global = Config::load_or_default(global_path);
        if let Some(home) = config_base(global_path) {
            global.resolve_paths(home);
        }
        config.merge(global);
    }

    // Project config overrides global
    if project_path.exists() {
        let mut project = Config::load_or_default(project_path);
        if let Some(root) = config_base(project_path) {
            project.resolve_paths(root);
        }
        config.merge(project);
    }

    config
}

/// `<base>/.keel/config.toml` -> `<base>`
fn config_base(config_path: &Path) -> Option<&Path> {
    config_path.parent().and_then(Path::parent)
}

/// Get the global keel config directory (~/.keel).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".keel"))
}

/// Get the project config path (.keel/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".keel").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.library.bind_paths.is_empty());
        assert!(!config.library.suppress_version_check);
        assert_eq!(config.compression(), Compression::default());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[library]
bind_paths = ["bin", "assets"]
compression = 9

[localization]
cultures = ["en-us", "de-de"]
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(
            config.library.bind_paths,
            vec![PathBuf::from("bin"), PathBuf::from("assets")]
        );
        assert_eq!(config.compression(), Compression::best());
        assert_eq!(config.localization.cultures, vec!["en-us", "de-de"]);
    }

    #[test]
    fn test_broken_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[library\nbind_paths = 3").unwrap();

        assert!(Config::load(&config_path).is_err());
        assert_eq!(Config::load_or_default(&config_path), Config::default());
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("home/.keel/config.toml");
        let project_path = tmp.path().join("project/.keel/config.toml");
        std::fs::create_dir_all(global_path.parent().unwrap()).unwrap();
        std::fs::create_dir_all(project_path.parent().unwrap()).unwrap();

        std::fs::write(
            &global_path,
            r#"
[library]
bind_paths = ["shared"]
compression = 1

[localization]
cultures = ["en-us"]
"#,
        )
        .unwrap();

        std::fs::write(
            &project_path,
            r#"
[library]
bind_paths = ["bin"]

[schema]
extensions = ["tables.xml"]
"#,
        )
        .unwrap();

        let config = load_config(&global_path, &project_path);

        // Project bind paths replace global ones, relative to the project
        assert_eq!(config.library.bind_paths, vec![tmp.path().join("project/bin")]);
        // Global compression and cultures are preserved
        assert_eq!(config.library.compression, Some(1));
        assert_eq!(config.localization.cultures, vec!["en-us"]);
        assert_eq!(
            config.schema.extensions,
            vec![tmp.path().join("project/tables.xml")]
        );
    }

    #[test]
    fn test_table_definitions_with_extension() {
        let tmp = TempDir::new().unwrap();
        let extension = tmp.path().join("ui.xml");
        std::fs::write(
            &extension,
            r#"<tableDefinitions xmlns="urn:keel:tables">
  <tableDefinition name="Dialog" createSymbols="yes">
    <columnDefinition name="Dialog" type="string" primaryKey="yes"/>
  </tableDefinition>
</tableDefinitions>"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.schema.extensions.push(extension);
        let schema = config.table_definitions().unwrap();
        assert!(schema.contains("Dialog"));
        assert!(schema.contains("Property"));

        config.schema.extensions.push(tmp.path().join("missing.xml"));
        assert!(config.table_definitions().is_err());
    }
}
