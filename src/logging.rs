//! Tracing subscriber setup

use crate::config::LoggingConfig;
use crate::error::{LedgerError, Result};
use tracing::Level;

/// Installs a global fmt subscriber at the configured level. Returns false when
/// a subscriber was already installed, which is not an error.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let level = parse_level(&config.level)?;
    Ok(tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok())
}

/// Parses a level name such as `info` or `DEBUG`.
pub fn parse_level(level: &str) -> Result<Level> {
    level.trim().parse::<Level>().map_err(|e| {
        LedgerError::Config(format!("logging.level {:?} is invalid: {}", level, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_level(" warn ").unwrap(), Level::WARN);
        assert_eq!(parse_level("trace").unwrap(), Level::TRACE);
        for bad in ["bogus", "infoo", ""] {
            assert!(matches!(parse_level(bad), Err(LedgerError::Config(_))));
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init(&config).unwrap();
        assert!(!init(&config).unwrap());
    }

    #[test]
    fn test_init_rejects_bad_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
        };
        assert!(matches!(init(&config), Err(LedgerError::Config(_))));
    }
}
