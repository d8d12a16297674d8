//! Operator commands read from stdin.

use crate::error::{AppError, AppResult};
use netpulse_core::TimeRange;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Manual full refresh.
    Refresh,
    /// Force a fresh push connection.
    Reconnect,
    Hidden,
    Visible,
    /// Change the trends range.
    Range(TimeRange),
    /// Watch a scan job until it finishes.
    Scan(String),
    /// Stop watching a scan job.
    CancelScan(String),
    /// Print Prometheus metrics.
    Metrics,
    Quit,
}

impl Command {
    /// Parse a command line. Blank lines yield `None`.
    pub fn parse(line: &str) -> AppResult<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("r" | "refresh", None) => Self::Refresh,
            ("c" | "reconnect", None) => Self::Reconnect,
            ("h" | "hide", None) => Self::Hidden,
            ("v" | "show", None) => Self::Visible,
            ("range", Some(token)) => Self::Range(
                token
                    .parse()
                    .map_err(|_| AppError::Command(format!("invalid range {token}")))?,
            ),
            ("scan", Some(id)) => Self::Scan(id.to_string()),
            ("cancel", Some(id)) => Self::CancelScan(id.to_string()),
            ("m" | "metrics", None) => Self::Metrics,
            ("q" | "quit" | "exit", None) => Self::Quit,
            _ => return Err(AppError::Command(line.trim().to_string())),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("r").unwrap(), Some(Command::Refresh));
        assert_eq!(Command::parse("  H ").unwrap(), Some(Command::Hidden));
        assert_eq!(Command::parse("v").unwrap(), Some(Command::Visible));
        assert_eq!(
            Command::parse("range 7d").unwrap(),
            Some(Command::Range(TimeRange::Week))
        );
        assert_eq!(
            Command::parse("scan 5f2c").unwrap(),
            Some(Command::Scan("5f2c".to_string()))
        );
        assert_eq!(Command::parse("q").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("range 2w").is_err());
        assert!(Command::parse("range").is_err());
        assert!(Command::parse("scan").is_err());
        assert!(Command::parse("dance").is_err());
        assert!(Command::parse("r now").is_err());
    }
}
