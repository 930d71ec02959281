use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

pub const DEFAULT_DB_URL: &str = "sqlite://theory.sqlite3";
pub const DEFAULT_CATALOG: &str = "data.json";

/// Settings read from the environment (and `.env`, if present).
/// Command-line flags override these.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: String,
    pub catalog_path: PathBuf,
    pub auto_advance: bool,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let db_url = env::var("THEORY_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string());
        let catalog_path = env::var("THEORY_CATALOG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CATALOG), PathBuf::from);
        let auto_advance = env::var("THEORY_AUTO_ADVANCE")
            .ok()
            .is_some_and(|value| parse_flag(&value));
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            db_url,
            catalog_path,
            auto_advance,
            rust_log,
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values() {
        for raw in ["1", "true", " YES ", "on"] {
            assert!(parse_flag(raw), "{raw}");
        }
        for raw in ["0", "false", "", "nope"] {
            assert!(!parse_flag(raw), "{raw}");
        }
    }
}
