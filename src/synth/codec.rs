//! Conversions between IPv6 addresses, `ip6.arpa` names and host digits

use crate::error::SynthError;
use crate::synth::rules::Prefix;
use std::net::Ipv6Addr;

pub const REVERSE_ZONE: &str = "ip6.arpa";

/// Format an address as its full nibble-reversed `ip6.arpa` name, without a trailing dot.
pub fn to_reverse_label(addr: Ipv6Addr) -> String {
    let nibbles = hex::encode(addr.octets());
    let mut label = String::with_capacity(nibbles.len() * 2 + REVERSE_ZONE.len());
    for nibble in nibbles.chars().rev() {
        label.push(nibble);
        label.push('.');
    }
    label.push_str(REVERSE_ZONE);
    label
}

/// Parse an `ip6.arpa` query name back into the address it names.
///
/// Returns `None` for anything that is not exactly 32 single-hex-digit labels
/// under the reverse zone. The zone suffix is compared case-insensitively.
pub fn from_reverse_label(qname: &str) -> Option<Ipv6Addr> {
    let qname = qname.strip_suffix('.').unwrap_or(qname);
    let split = qname.len().checked_sub(REVERSE_ZONE.len() + 1)?;
    if !qname.is_char_boundary(split) {
        return None;
    }
    let (nibble_part, suffix) = qname.split_at(split);
    if !suffix.eq_ignore_ascii_case(".ip6.arpa") {
        return None;
    }

    let nibbles: Vec<&str> = nibble_part.split('.').collect();
    if nibbles.len() != 32 || nibbles.iter().any(|n| n.len() != 1) {
        return None;
    }

    let hex_str: String = nibbles.iter().rev().copied().collect();
    let mut octets = [0u8; 16];
    hex::decode_to_slice(&hex_str, &mut octets).ok()?;
    Some(Ipv6Addr::from(octets))
}

/// Host digits of `addr` inside `prefix`, zero padded to `prefix.digits_len()`.
///
/// For prefix lengths that are not a multiple of 4 the host part can need one
/// more digit than the padded width; it is emitted as is and will not convert
/// back through [`digits_to_address`].
pub fn extract_digits(addr: Ipv6Addr, prefix: &Prefix) -> Result<String, SynthError> {
    if !prefix.contains(addr) {
        return Err(SynthError::OutOfRange { addr, network: prefix.to_string() });
    }
    let host = u128::from(addr) ^ u128::from(prefix.base());
    Ok(format!("{:0width$x}", host, width = prefix.digits_len()))
}

pub fn digits_to_address(digits: &str, prefix: &Prefix) -> Result<Ipv6Addr, SynthError> {
    let expected = prefix.digits_len();
    if digits.len() != expected {
        return Err(SynthError::DigitsLength { expected, actual: digits.len() });
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SynthError::InvalidHex(digits.to_string()));
    }
    let host = u128::from_str_radix(digits, 16).map_err(|_| SynthError::InvalidHex(digits.to_string()))?;
    Ok(Ipv6Addr::from(u128::from(prefix.base()) | host))
}
