//! Small leaf helpers shared across colcache

use crate::common::{Error, Result};

/// Resolve the node identity: explicit override, then the `HOSTNAME`
/// environment variable, then OS host-name resolution.
pub fn resolve_hostname(overridden: Option<&str>) -> Result<String> {
    if let Some(name) = overridden {
        if !name.is_empty() {
            return Ok(name.to_string());
        }
    }
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.is_empty() {
            tracing::debug!("hostname from environment: {}", name);
            return Ok(name);
        }
    }
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .ok_or(Error::HostnameUnresolvable)
}

/// Parse a cache version as published in the coordination service:
/// a UTF-8 encoded non-negative integer.
pub fn parse_version(raw: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::Corrupted("cache version value is not UTF-8".into()))?;
    text.trim()
        .parse::<u64>()
        .map_err(|_| Error::Corrupted(format!("cache version value is not an integer: {:?}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version(b"0").unwrap(), 0);
        assert_eq!(parse_version(b"42").unwrap(), 42);
        assert_eq!(parse_version(b" 7\n").unwrap(), 7);
    }

    #[test]
    fn test_parse_version_invalid() {
        assert!(parse_version(b"").is_err());
        assert!(parse_version(b"-1").is_err());
        assert!(parse_version(b"abc").is_err());
        assert!(parse_version(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_hostname_override_wins() {
        assert_eq!(resolve_hostname(Some("worker-3")).unwrap(), "worker-3");
    }

    #[test]
    fn test_hostname_empty_override_falls_through() {
        // An empty override must not be taken literally; resolution falls
        // back to the environment or the OS, both of which may legitimately
        // succeed here, so only the non-empty guarantee is asserted.
        if let Ok(name) = resolve_hostname(Some("")) {
            assert!(!name.is_empty());
        }
    }
}
