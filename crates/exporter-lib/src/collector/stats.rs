//! Per-device statistics (`eadm stat -d <device>`)
//!
//! The tool prints one counter per line in the form `listen_create_cnt : 0`.
//! Output varies between driver releases, so anything that does not look like
//! a counter line is dropped instead of failing the whole device.

use super::runner::{CommandError, CommandRunner};
use crate::models::CounterSnapshot;
use tracing::debug;

/// Parse `key : value` lines into a counter snapshot
pub fn parse_stats(output: &str) -> CounterSnapshot {
    let mut stats = CounterSnapshot::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match parse_counter(value) {
            Some(value) => {
                stats.insert(key.to_string(), value);
            }
            None => debug!(key = %key, value = %value, "Skipping unparseable counter"),
        }
    }

    stats
}

/// Unsigned decimal, digits only
fn parse_counter(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Run the stats tool for one device and parse its output
pub async fn fetch_stats(
    runner: &dyn CommandRunner,
    program: &str,
    device: &str,
) -> Result<CounterSnapshot, CommandError> {
    let output = runner.run(program, &["stat", "-d", device]).await?;
    Ok(parse_stats(&String::from_utf8_lossy(&output)))
}
