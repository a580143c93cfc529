//! Error types for the synthesis core

use std::net::Ipv6Addr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[error("address {addr} is outside network {network}")]
    OutOfRange { addr: Ipv6Addr, network: String },

    #[error("expected {expected} host digits, got {actual}")]
    DigitsLength { expected: usize, actual: usize },

    #[error("invalid hex digits: {0}")]
    InvalidHex(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("template must contain exactly one {placeholder}, got: {template}")]
    Placeholder { placeholder: &'static str, template: String },

    #[error("invalid IPv6 prefix '{0}'")]
    InvalidPrefix(String),

    #[error("prefix {0} has host bits set")]
    HostBitsSet(String),

    #[error("template {template} renders an invalid hostname: {reason}")]
    InvalidHostname { template: String, reason: String },

    #[error("upstream resolver must not be empty")]
    EmptyUpstream,

    #[error("failed to compile template pattern: {0}")]
    Pattern(String),
}
