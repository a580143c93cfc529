//! Basic types shared by the handler, the wire codec and the listeners

use std::fmt;
use std::net::Ipv6Addr;

/// TTL of every synthesized or relayed answer.
pub const ANSWER_TTL: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QType { PTR, AAAA, Other(u16) }

impl QType {
    pub fn from_code(code: u16) -> Self {
        match code {
            12 => QType::PTR,
            28 => QType::AAAA,
            other => QType::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            QType::PTR => 12,
            QType::AAAA => 28,
            QType::Other(code) => code,
        }
    }
}

impl fmt::Display for QType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QType::PTR => f.write_str("PTR"),
            QType::AAAA => f.write_str("AAAA"),
            QType::Other(code) => write!(f, "TYPE{}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rcode { NoError, FormErr, NXDomain }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    PTR { ptrdname: String },
    AAAA { addr: Ipv6Addr },
}

/// One decoded question, as handed to the request handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub id: u16,
    /// Query name as sent, including the trailing dot when fully qualified.
    pub qname: String,
    pub qtype: QType,
    pub recursion_desired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub rcode: Rcode,
    pub answers: Vec<Record>,
}

impl Outcome {
    pub fn answered(answers: Vec<Record>) -> Self {
        Self { rcode: Rcode::NoError, answers }
    }

    pub fn nxdomain() -> Self {
        Self { rcode: Rcode::NXDomain, answers: Vec::new() }
    }

    pub fn formerr() -> Self {
        Self { rcode: Rcode::FormErr, answers: Vec::new() }
    }
}
