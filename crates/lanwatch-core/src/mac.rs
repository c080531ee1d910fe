//! MAC address normalization.
//!
//! Every MAC is reduced to one canonical form (uppercase, colon-separated)
//! before it is compared or stored. Accepted inputs use `:`, `-`, `.` or no
//! separator at all (`3c:22:fb:aa:bb:cc`, `3C-22-FB-AA-BB-CC`,
//! `3c22.fbaa.bbcc`, `3C22FBAABBCC`).

use crate::error::CoreError;

/// Normalize a MAC address to `AA:BB:CC:DD:EE:FF`.
pub fn normalize_mac(raw: &str) -> Result<String, CoreError> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidMac(raw.to_string()));
    }

    let upper = hex.to_ascii_uppercase();
    let octets: Vec<&str> = (0..6).map(|i| &upper[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

/// The vendor-identifying prefix (first three octets) of a normalized MAC.
pub fn oui(mac: &str) -> Option<&str> {
    if mac.len() == 17 {
        mac.get(..8)
    } else {
        None
    }
}

/// Whether the locally-administered bit is set (randomized or virtual MAC).
pub fn is_locally_administered(mac: &str) -> bool {
    mac.get(..2)
        .and_then(|first| u8::from_str_radix(first, 16).ok())
        .is_some_and(|octet| octet & 0x02 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_collapse_to_one_key() {
        let a = normalize_mac("3c:22:fb:aa:bb:cc").unwrap();
        let b = normalize_mac("3C-22-FB-AA-BB-CC").unwrap();
        let c = normalize_mac("3c22.fbaa.bbcc").unwrap();
        let d = normalize_mac(" 3C22FBAABBCC ").unwrap();
        assert_eq!(a, "3C:22:FB:AA:BB:CC");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, d);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(normalize_mac("").is_err());
        assert!(normalize_mac("3c:22:fb:aa:bb").is_err());
        assert!(normalize_mac("zz:22:fb:aa:bb:cc").is_err());
        assert!(normalize_mac("3c:22:fb:aa:bb:cc:dd").is_err());
    }

    #[test]
    fn test_oui_prefix() {
        assert_eq!(oui("3C:22:FB:AA:BB:CC"), Some("3C:22:FB"));
        assert_eq!(oui("3C22FB"), None);
    }

    #[test]
    fn test_locally_administered_bit() {
        assert!(is_locally_administered("DA:A1:19:00:00:01"));
        assert!(!is_locally_administered("3C:22:FB:AA:BB:CC"));
    }
}
