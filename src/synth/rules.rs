use crate::error::RuleError;
use crate::synth::template::TemplateMatcher;
use crate::wire::fqdn;
use ipnetwork::Ipv6Network;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// An IPv6 network: base address with all host bits zero, plus its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    base: Ipv6Addr,
    len: u8,
}

impl Prefix {
    pub fn new(base: Ipv6Addr, len: u8) -> Result<Self, RuleError> {
        let net = Ipv6Network::new(base, len).map_err(|_| RuleError::InvalidPrefix(format!("{}/{}", base, len)))?;
        if net.network() != base {
            return Err(RuleError::HostBitsSet(net.to_string()));
        }
        Ok(Self { base, len })
    }

    pub fn base(&self) -> Ipv6Addr {
        self.base
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    fn mask(&self) -> u128 {
        if self.len == 0 { 0 } else { u128::MAX << (128 - u32::from(self.len)) }
    }

    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        u128::from(addr) & self.mask() == u128::from(self.base)
    }

    /// Number of hex digits covering the host part; a trailing partial nibble is dropped.
    pub fn digits_len(&self) -> usize {
        (128 - usize::from(self.len)) / 4
    }

    /// Longest digit string a host in this network can produce.
    pub fn max_digits_len(&self) -> usize {
        self.digits_len() + usize::from(self.len % 4 != 0)
    }
}

impl FromStr for Prefix {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net = Ipv6Network::from_str(s.trim()).map_err(|_| RuleError::InvalidPrefix(s.to_string()))?;
        Self::new(net.ip(), net.prefix())
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.len)
    }
}

/// One configured `network` block.
#[derive(Debug, Clone)]
pub struct NetworkRule {
    pub prefix: Prefix,
    pub matcher: TemplateMatcher,
    pub upstream: Option<String>,
}

impl NetworkRule {
    pub fn new(prefix: Prefix, template: &str, upstream: Option<String>) -> Result<Self, RuleError> {
        let matcher = TemplateMatcher::compile(template)?;
        if matches!(upstream.as_deref(), Some(u) if u.trim().is_empty()) {
            return Err(RuleError::EmptyUpstream);
        }
        // every host in the network must render to a legal DNS name
        let widest = matcher.render(&"f".repeat(prefix.max_digits_len()));
        fqdn(&widest).map_err(|e| RuleError::InvalidHostname {
            template: template.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { prefix, matcher, upstream })
    }

    pub fn template(&self) -> &str {
        self.matcher.template()
    }
}

/// Rules in configuration order. The first matching rule wins in both
/// directions, even when a later rule is more specific.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<NetworkRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<NetworkRule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkRule> {
        self.rules.iter()
    }

    pub fn find_by_address(&self, addr: Ipv6Addr) -> Option<&NetworkRule> {
        self.rules.iter().find(|rule| rule.prefix.contains(addr))
    }

    pub fn find_by_hostname(&self, hostname: &str) -> Option<(&NetworkRule, String)> {
        self.rules
            .iter()
            .find_map(|rule| rule.matcher.match_digits(hostname).map(|digits| (rule, digits)))
    }
}
