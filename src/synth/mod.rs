pub mod codec;
pub mod rules;
pub mod template;

use crate::synth::rules::{NetworkRule, RuleSet};
use std::net::Ipv6Addr;
use std::sync::Arc;

/// Address <-> hostname synthesis over an immutable rule set.
#[derive(Debug, Clone)]
pub struct SynthesisEngine {
    rules: Arc<RuleSet>,
}

impl SynthesisEngine {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn hostname_for_address(&self, addr: Ipv6Addr) -> Option<String> {
        let rule = self.rules.find_by_address(addr)?;
        Self::hostname_in_rule(addr, rule)
    }

    /// Render `addr` through an already resolved rule.
    pub fn hostname_in_rule(addr: Ipv6Addr, rule: &NetworkRule) -> Option<String> {
        match codec::extract_digits(addr, &rule.prefix) {
            Ok(digits) => Some(rule.matcher.render(&digits)),
            Err(e) => {
                tracing::debug!("Cannot synthesize hostname for {}: {}", addr, e);
                None
            }
        }
    }

    pub fn address_for_hostname(&self, hostname: &str) -> Option<Ipv6Addr> {
        let (rule, digits) = self.rules.find_by_hostname(hostname)?;
        match codec::digits_to_address(&digits, &rule.prefix) {
            Ok(addr) => Some(addr),
            Err(e) => {
                tracing::debug!("Hostname '{}' matched {} but did not convert: {}", hostname, rule.prefix, e);
                None
            }
        }
    }
}
