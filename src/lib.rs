//! dns-is-reverse - synthesizes IPv6 PTR and AAAA answers from per-network templates

pub mod config;
pub mod dns_server;
pub mod error;
pub mod handler;
pub mod synth;
pub mod types;
pub mod upstream;
pub mod wire;
