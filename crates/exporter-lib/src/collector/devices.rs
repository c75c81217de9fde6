//! Device enumeration from `ibv_devices` output
//!
//! The tool prints a two line header followed by one device per line:
//!
//! ```text
//!     device                 node GUID
//!     ------              ----------------
//!     erdma_0             02163efffe5030b3
//! ```

use super::runner::{CommandError, CommandRunner};
use crate::models::Device;
use tracing::debug;

/// Number of header lines printed before the device table
const HEADER_LINES: usize = 2;

/// Parse the device listing into device records
///
/// Header lines are skipped unconditionally. Lines with fewer than two
/// whitespace separated fields are ignored.
pub fn parse_devices(output: &str) -> Vec<Device> {
    let mut devices = Vec::new();

    for (index, line) in output.lines().enumerate().skip(HEADER_LINES) {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(name), Some(guid)) => {
                debug!(device = %name, guid = %guid, "Found device");
                devices.push(Device::new(name, guid));
            }
            (Some(_), None) => {
                debug!(line = index + 1, content = %line.trim(), "Skipping malformed device line");
            }
            _ => {}
        }
    }

    devices
}

/// Run the device listing tool and parse its output
///
/// A command failure yields no devices at all, never a partial list.
pub async fn list_devices(
    runner: &dyn CommandRunner,
    program: &str,
) -> Result<Vec<Device>, CommandError> {
    let output = runner.run(program, &[]).await?;
    let devices = parse_devices(&String::from_utf8_lossy(&output));
    debug!(count = devices.len(), "Enumerated devices");
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "    device                 node GUID\n    ------              ----------------\n";

    #[test]
    fn test_parse_single_device() {
        let output = format!("{HEADER}erdma_0             02163efffe5030b3\n");
        let devices = parse_devices(&output);
        assert_eq!(devices, vec![Device::new("erdma_0", "02163efffe5030b3")]);
    }

    #[test]
    fn test_parse_keeps_enumeration_order() {
        let output = format!(
            "{HEADER}    erdma_1    02163efffe5030b4\n    erdma_0    02163efffe5030b3\n"
        );
        let names: Vec<_> = parse_devices(&output).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["erdma_1", "erdma_0"]);
    }

    #[test]
    fn test_parse_skips_blank_and_short_lines() {
        let output = format!("{HEADER}\n   \nerdma_0\nerdma_1 0216 extra fields\n");
        let devices = parse_devices(&output);
        assert_eq!(devices, vec![Device::new("erdma_1", "0216")]);
    }

    #[test]
    fn test_parse_header_is_skipped_even_if_it_looks_like_a_device() {
        let output = "erdma_9 aaaa\nerdma_8 bbbb\nerdma_0 cccc\n";
        let devices = parse_devices(output);
        assert_eq!(devices, vec![Device::new("erdma_0", "cccc")]);
    }

    #[test]
    fn test_parse_header_only_or_empty() {
        assert!(parse_devices(HEADER).is_empty());
        assert!(parse_devices("").is_empty());
    }

    #[test]
    fn test_parse_handles_crlf() {
        let output = "h1\r\nh2\r\nerdma_0 02163efffe5030b3\r\n";
        assert_eq!(
            parse_devices(output),
            vec![Device::new("erdma_0", "02163efffe5030b3")]
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let output = format!("{HEADER}erdma_0 a\nerdma_1 b\n");
        assert_eq!(parse_devices(&output), parse_devices(&output));
    }
}
