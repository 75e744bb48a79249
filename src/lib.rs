pub mod config;
pub mod construct;
pub mod db;
pub mod extract;
pub mod organize;

/// Audio file extensions accepted by default (overridable in config)
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "wma",
];

/// Application name for XDG paths
pub const APP_NAME: &str = "tracktidy";
