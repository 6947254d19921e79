use std::net::IpAddr;

use crate::models::ValidationError;

/// Maximum hostname length (RFC 1035 presentation form)
pub const HOSTNAME_MAX_LEN: usize = 253;

/// Maximum site identifier length
pub const SITE_MAX_LEN: usize = 100;

/// Trim a string field and check it is 1..=max characters.
/// Returns the trimmed value.
pub fn normalize_bounded(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters (got {})", max, len),
        ));
    }
    Ok(trimmed.to_string())
}

/// Normalize a hostname: trimmed, 1..=253 characters.
pub fn normalize_hostname(hostname: &str) -> Result<String, ValidationError> {
    normalize_bounded("hostname", hostname, HOSTNAME_MAX_LEN)
}

/// Normalize a site identifier: trimmed, 1..=100 characters.
pub fn normalize_site(site: &str) -> Result<String, ValidationError> {
    normalize_bounded("site", site, SITE_MAX_LEN)
}

/// Parse an IPv4 or IPv6 management address.
pub fn parse_management_ip(ip: &str) -> Result<IpAddr, ValidationError> {
    ip.trim()
        .parse::<IpAddr>()
        .map_err(|_| ValidationError::new("management_ip", format!("invalid IP address: '{}'", ip)))
}

/// Canonical textual form of an address, used for uniqueness and error reporting.
/// e.g., "2001:DB8:0::1" -> "2001:db8::1"
pub fn canonical_ip(ip: &IpAddr) -> String {
    ip.to_string()
}
