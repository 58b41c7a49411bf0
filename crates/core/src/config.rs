//! syncbox configuration file parsing (syncbox.toml)

use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::eyre;

/// syncbox configuration
///
/// Loaded once at startup: TOML file first, then `SYNCBOX_*` environment
/// variables, then CLI flags (applied by the binaries).
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Source tree to replicate
    pub source_directory: PathBuf,

    /// Destination tree the agent writes into
    pub destination_directory: PathBuf,

    /// Base URL of the destination agent
    pub base_url: String,

    /// Resolve the two directories under `$HOME`
    pub use_absolute_paths: bool,

    /// Poll cycle period in milliseconds
    pub poll_interval_ms: u64,

    /// Glob patterns excluded from scanning (never replicated)
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::new(),
            destination_directory: PathBuf::new(),
            base_url: "http://localhost:8080".to_string(),
            use_absolute_paths: false,
            poll_interval_ms: 1000,
            exclude: Vec::new(),
        }
    }
}

/// Default config file name
pub const CONFIG_FILE: &str = "syncbox.toml";

impl Config {
    /// Load config from a file, then apply environment overrides.
    ///
    /// A missing file yields the defaults (environment overrides still
    /// apply, so a file is optional).
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("SYNCBOX_SOURCE_DIRECTORY") {
            self.source_directory = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("SYNCBOX_DESTINATION_DIRECTORY") {
            self.destination_directory = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("SYNCBOX_BASE_URL") {
            self.base_url = value;
        }
        if let Ok(value) = std::env::var("SYNCBOX_USE_ABSOLUTE_PATHS") {
            self.use_absolute_paths = matches!(value.as_str(), "1" | "true" | "yes");
        }
    }

    /// Poll cycle period
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Source directory with `use-absolute-paths` resolution applied
    ///
    /// # Errors
    /// Returns an error if `$HOME` is needed but unset.
    pub fn resolved_source_directory(&self) -> color_eyre::Result<PathBuf> {
        self.resolve(&self.source_directory)
    }

    /// Destination directory with `use-absolute-paths` resolution applied
    ///
    /// # Errors
    /// Returns an error if `$HOME` is needed but unset.
    pub fn resolved_destination_directory(&self) -> color_eyre::Result<PathBuf> {
        self.resolve(&self.destination_directory)
    }

    fn resolve(&self, dir: &Path) -> color_eyre::Result<PathBuf> {
        if !self.use_absolute_paths {
            return Ok(dir.to_path_buf());
        }
        let home = std::env::var_os("HOME")
            .ok_or_else(|| eyre!("use-absolute-paths is set but HOME is not"))?;
        Ok(resolve_under(dir, Path::new(&home)))
    }
}

/// Join `dir` under `home`, dropping a leading `~` or `/` so "~/sync" and
/// "/sync" both land at `$HOME/sync`.
fn resolve_under(dir: &Path, home: &Path) -> PathBuf {
    let trimmed = dir.to_string_lossy();
    let trimmed = trimmed.trim_start_matches('~');
    let trimmed = trimmed.trim_start_matches('/');
    home.join(trimmed)
}
