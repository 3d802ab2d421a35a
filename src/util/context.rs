//! Global context for keel operations.
//!
//! Provides centralized access to the working directory, the keel home
//! directory and the layered configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::table_definition::TableDefinitionCollection;
use crate::util::config::{self, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global keel data (~/.keel/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,

    /// Global config merged with the project config
    config: Config,
}

impl GlobalContext {
    /// Create a context for the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a context rooted at `cwd`, loading its project config.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let home = config::global_config_dir().unwrap_or_else(|| PathBuf::from(".keel"));
        let config = config::load_config(
            &home.join("config.toml"),
            &config::project_config_path(&cwd),
        );

        Ok(GlobalContext {
            cwd,
            home,
            verbose: false,
            color: true,
            config,
        })
    }

    /// Replace the loaded configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The keel home directory (~/.keel/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn color(&self) -> bool {
        self.color
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Resolve `path` against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Bind paths for payload resolution. Falls back to the working
    /// directory when none are configured.
    pub fn bind_paths(&self) -> Vec<PathBuf> {
        if self.config.library.bind_paths.is_empty() {
            vec![self.cwd.clone()]
        } else {
            self.config
                .library
                .bind_paths
                .iter()
                .map(|p| self.resolve(p))
                .collect()
        }
    }

    /// The table schema: built-in tables plus configured extensions.
    pub fn table_definitions(&self) -> Result<TableDefinitionCollection> {
        self.config.table_definitions()
    }
}
