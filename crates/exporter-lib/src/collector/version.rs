//! Kernel driver version probe (`eadm ver`)

use super::runner::{CommandError, CommandRunner};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Subcommand printing the driver version
pub const VERSION_SUBCOMMAND: &str = "ver";

static VERSION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn version_pattern() -> &'static Regex {
    VERSION_PATTERN.get_or_init(|| {
        Regex::new(r"Query kernel driver version:\s+(\S+)").expect("version pattern is valid")
    })
}

#[derive(Debug, Error)]
pub enum VersionError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("no driver version in output: {0:?}")]
    Unparseable(String),
}

/// Extract the driver version from `eadm ver` output
pub fn parse_version(output: &str) -> Option<String> {
    version_pattern()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Run the version tool and extract the driver version
pub async fn probe_version(
    runner: &dyn CommandRunner,
    program: &str,
) -> Result<String, VersionError> {
    let output = runner.run(program, &[VERSION_SUBCOMMAND]).await?;
    let text = String::from_utf8_lossy(&output);
    parse_version(&text).ok_or_else(|| VersionError::Unparseable(text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("Query kernel driver version: 0.2.38\n"),
            Some("0.2.38".to_string())
        );
    }

    #[test]
    fn test_parse_version_among_other_lines() {
        let output = "eadm tool v1.4\nQuery kernel driver version:\t0.2.40-rc1  (built)\nok\n";
        assert_eq!(parse_version(output), Some("0.2.40-rc1".to_string()));
    }

    #[test]
    fn test_parse_version_missing() {
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("Query kernel driver version:\n"), None);
        assert_eq!(parse_version("driver version 0.2.38\n"), None);
    }
}
