//! Centralized validation functions for asnlist.
//!
//! This module provides unified validation for:
//! - ASN identifiers (used as cache file names and URL path segments)
//! - IPv4 prefixes returned by the lookup service
//! - Lookup service base URLs

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

use crate::error::{Result, SyncError};

/// Longest ASN identifier accepted.
const MAX_ASN_LEN: usize = 32;

/// Validate an ASN identifier.
///
/// ASNs are opaque strings, but they end up in file paths and URLs, so only
/// ASCII letters and digits are accepted.
///
/// # Examples
/// ```
/// use asnlist::validation::validate_asn;
/// assert!(validate_asn("64500").is_ok());
/// assert!(validate_asn("../etc").is_err());
/// assert!(validate_asn("").is_err());
/// ```
pub fn validate_asn(asn: &str) -> Result<()> {
    if asn.is_empty() {
        return Err(SyncError::Config("ASN cannot be empty".to_string()));
    }

    if asn.len() > MAX_ASN_LEN {
        return Err(SyncError::Config(format!(
            "ASN '{}' is longer than {} characters",
            asn, MAX_ASN_LEN
        )));
    }

    if !asn.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SyncError::Config(format!(
            "Invalid ASN '{}'. Only ASCII letters and digits are allowed",
            asn
        )));
    }

    Ok(())
}

/// Build an IPv4 prefix from the lookup service's `(ip, cidr)` pair.
///
/// Returns `None` for IPv6 addresses, malformed addresses and prefix lengths
/// outside 0..=32.
///
/// # Examples
/// ```
/// use asnlist::validation::ipv4_prefix;
/// assert_eq!(ipv4_prefix("1.2.3.0", 24).unwrap().to_string(), "1.2.3.0/24");
/// assert!(ipv4_prefix("2001:db8::", 32).is_none());
/// assert!(ipv4_prefix("1.2.3.0", 33).is_none());
/// ```
pub fn ipv4_prefix(ip: &str, cidr: i64) -> Option<Ipv4Net> {
    let addr: Ipv4Addr = ip.trim().parse().ok()?;
    let len = u8::try_from(cidr).ok()?;
    Ipv4Net::new(addr, len).ok()
}

/// Validate the lookup service base URL.
///
/// HTTPS is required except for loopback hosts.
pub fn validate_api_url(url: &str) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }

    let loopback = ["http://127.0.0.1", "http://localhost", "http://[::1]"];
    let is_loopback = loopback.iter().any(|prefix| {
        url.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([':', '/']))
    });
    if is_loopback {
        return Ok(());
    }

    Err(SyncError::Config(format!(
        "Lookup service URL must use HTTPS: {}",
        url
    )))
}
