use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::construct::ConstructStyle;

/// Placeholder values used when a field cannot be parsed from a filename.
/// Placeholders are never empty: the block layout needs every group present
/// to round-trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FieldDefaults {
    pub artist: String,
    pub title: String,
    pub features: String,
    pub misc: String,
    pub source_id: String,
    pub filetype: String,
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self {
            artist: "Unknown Artist".to_string(),
            title: "Unknown Title".to_string(),
            features: "None".to_string(),
            misc: "None".to_string(),
            source_id: "None".to_string(),
            filetype: "mp3".to_string(),
        }
    }
}

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Placeholder values for fields the extractor couldn't fill.
    pub defaults: FieldDefaults,
    /// File extensions accepted by the extension gate.
    pub extensions: Vec<String>,
    /// Compare extensions against the allow-list ignoring case.
    pub case_insensitive_extensions: bool,
    /// Filename layout used when constructing new names.
    pub style: ConstructStyle,
    /// Extractor to use; unknown names fall back to "standard" with a warning.
    pub extractor: String,
    /// Directories to organize (used when `organize` has no CLI args).
    pub music_dirs: Vec<PathBuf>,
    /// Custom database path (overrides XDG default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: FieldDefaults::default(),
            extensions: crate::DEFAULT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            case_insensitive_extensions: true,
            style: ConstructStyle::default(),
            extractor: "standard".to_string(),
            music_dirs: Vec::new(),
            db_path: None,
        }
    }
}

impl AppConfig {
    /// Load config from the given path, or `~/.config/tracktidy/config.toml`.
    /// Returns default config if the file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load(path_override: Option<&Path>) -> Self {
        let config_path = match path_override {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path(),
        };
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Write the configuration back as TOML (used by the `set` command).
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }

    /// Resolve the extractor name through the closed alias table.
    /// Unknown names log a warning and fall back to the standard extractor.
    pub fn resolve_extractor(&self) -> &'static str {
        match self.extractor.to_lowercase().as_str() {
            "standard" | "default" | "normal" => "standard",
            other => {
                log::warn!("Extractor '{other}' not found, falling back to 'standard'");
                "standard"
            }
        }
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("tracktidy.db")
    } else {
        // Fallback: current directory
        PathBuf::from("tracktidy.db")
    }
}
