//! Runtime configuration, immutable after startup.

use std::time::Duration;

/// Parameters the daemon is wired up with.
#[derive(Debug, Clone)]
pub struct Config {
    /// Scheduler API base URLs; more than one member in HA setups.
    pub marathon_urls: Vec<String>,
    /// Registry agent base URL.
    pub consul_url: String,
    /// Interval between full resyncs. Must be greater than zero.
    pub resync_interval: Duration,
    /// Log intended register/deregister calls without executing them.
    pub dry_run: bool,
}

impl Config {
    /// Split a comma-separated URL list into its members, trimming
    /// whitespace and dropping empty entries.
    pub fn split_urls(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Parse a duration string like `5m`, `90s`, `1h30m`, or `250ms`.
///
/// Accepts one or more `<integer><unit>` components where unit is one of
/// `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`. A zero total is rejected, as is
/// an empty or trailing-garbage input.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in duration {input:?}"))?;
        if digits_end == 0 {
            return Err(format!("invalid duration {input:?}"));
        }
        let value: u64 = rest[..digits_end]
            .parse()
            .map_err(|_| format!("invalid duration {input:?}"))?;
        rest = &rest[digits_end..];

        let (unit, len) = match () {
            _ if rest.starts_with("ns") => (Duration::from_nanos(value), 2),
            _ if rest.starts_with("us") => (Duration::from_micros(value), 2),
            _ if rest.starts_with("µs") => (Duration::from_micros(value), "µs".len()),
            _ if rest.starts_with("ms") => (Duration::from_millis(value), 2),
            _ if rest.starts_with('s') => (Duration::from_secs(value), 1),
            _ if rest.starts_with('m') => (Duration::from_secs(value.saturating_mul(60)), 1),
            _ if rest.starts_with('h') => (Duration::from_secs(value.saturating_mul(3600)), 1),
            _ => return Err(format!("unknown unit in duration {input:?}")),
        };
        total += unit;
        rest = &rest[len..];
    }

    if total.is_zero() {
        return Err("duration must be greater than 0".to_string());
    }
    Ok(total)
}
