pub mod analyzer;
pub mod config;
pub mod db;
pub mod scales;
pub mod stats;
pub mod trends;

/// File extension of recorded estimator output
pub const CAPTURE_EXTENSION: &str = "json";

/// Application name for XDG paths
pub const APP_NAME: &str = "scaletrack";
