use std::env;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file of devices to load at startup; empty disables seeding
    pub seed_path: String,
    /// Abort startup on the first invalid or duplicate seed entry
    pub seed_strict: bool,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            seed_path: get_env("SEED_PATH", ""),
            seed_strict: parse_bool(&get_env("SEED_STRICT", "false")),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
