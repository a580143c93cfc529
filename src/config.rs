//! Configuration parsing for dns-is-reverse
//!
//! ```text
//! listen ::1
//! port 5353
//! querylog
//! network 2001:db8::/64
//!     resolves to host-%DIGITS%.example.com
//!     with upstream 2001:4860:4860::8888
//! ```

use crate::synth::rules::{NetworkRule, Prefix, RuleSet};
use anyhow::{Context, Result};
use std::net::IpAddr;

pub const DEFAULT_PORT: u16 = 53;
pub const DEFAULT_LISTEN: [&str; 2] = ["::", "0.0.0.0"];

#[derive(Debug)]
pub struct Config {
    pub listen_addresses: Vec<String>,
    pub port: u16,
    pub query_log: bool,
    pub rules: RuleSet,
}

#[derive(Debug, PartialEq)]
enum Token { Text(String), Indent, Newline }

/// One non-empty line after lexing.
struct Line { number: usize, indented: bool, words: Vec<String> }

struct RawNetwork { line: usize, prefix: String, template: Option<String>, upstream: Option<String> }

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::parse(&content).with_context(|| format!("Invalid config file '{}'", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let lines = Self::split_lines(&Self::lex(content));

        let mut listen_addresses = Vec::new();
        let mut port = DEFAULT_PORT;
        let mut query_log = false;
        let mut networks: Vec<RawNetwork> = Vec::new();
        let mut in_network = false;

        for line in &lines {
            let words: Vec<&str> = line.words.iter().map(String::as_str).collect();
            if line.indented {
                let network = match networks.last_mut() {
                    Some(n) if in_network => n,
                    _ => anyhow::bail!("line {}: indented directive outside a network block", line.number),
                };
                Self::parse_network_directive(network, &words, line.number)?;
                continue;
            }

            in_network = false;
            match words.as_slice() {
                ["listen", addr] => {
                    addr.parse::<IpAddr>()
                        .map_err(|_| anyhow::anyhow!("line {}: invalid listen address '{}'", line.number, addr))?;
                    listen_addresses.push(addr.to_string());
                }
                ["port", p] => {
                    port = p.parse().map_err(|_| anyhow::anyhow!("line {}: invalid port '{}'", line.number, p))?;
                }
                ["querylog"] => query_log = true,
                ["network", prefix] => {
                    networks.push(RawNetwork { line: line.number, prefix: prefix.to_string(), template: None, upstream: None });
                    in_network = true;
                }
                _ => anyhow::bail!("line {}: unknown directive: {}", line.number, words.join(" ")),
            }
        }

        let mut rules = Vec::with_capacity(networks.len());
        for raw in networks {
            let prefix: Prefix = raw.prefix.parse().with_context(|| format!("line {}: bad network", raw.line))?;
            let template = raw
                .template
                .ok_or_else(|| anyhow::anyhow!("line {}: network {} missing 'resolves to' directive", raw.line, raw.prefix))?;
            let rule = NetworkRule::new(prefix, &template, raw.upstream)
                .with_context(|| format!("line {}: network {}", raw.line, raw.prefix))?;
            rules.push(rule);
        }

        if listen_addresses.is_empty() {
            listen_addresses = DEFAULT_LISTEN.iter().map(|s| s.to_string()).collect();
        }

        Ok(Config { listen_addresses, port, query_log, rules: RuleSet::new(rules) })
    }

    fn parse_network_directive(network: &mut RawNetwork, words: &[&str], number: usize) -> Result<()> {
        match words {
            ["resolves", "to", template] => {
                if network.template.is_some() {
                    anyhow::bail!("line {}: duplicate 'resolves to' for network {}", number, network.prefix);
                }
                network.template = Some(template.to_string());
            }
            ["with", "upstream", resolver] => {
                if network.upstream.is_some() {
                    anyhow::bail!("line {}: duplicate 'with upstream' for network {}", number, network.prefix);
                }
                network.upstream = Some(resolver.to_string());
            }
            _ => anyhow::bail!("line {}: unknown network directive: {}", number, words.join(" ")),
        }
        Ok(())
    }

    fn lex(input: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut chars = input.chars().peekable();
        let mut line_start = true;
        while let Some(&c) = chars.peek() {
            if c == '\n' { tokens.push(Token::Newline); chars.next(); line_start = true; }
            else if c.is_whitespace() {
                if line_start { tokens.push(Token::Indent); line_start = false; }
                chars.next();
            }
            else if c == '#' { while let Some(&c) = chars.peek() { if c == '\n' { break; } chars.next(); } }
            else if c == '"' {
                line_start = false;
                chars.next();
                let mut s = String::new();
                while let Some(&c) = chars.peek() { if c == '"' || c == '\n' { break; } s.push(c); chars.next(); }
                if chars.peek() == Some(&'"') { chars.next(); }
                tokens.push(Token::Text(s));
            } else {
                line_start = false;
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '#' || c == '"' { break; }
                    s.push(c); chars.next();
                }
                tokens.push(Token::Text(s));
            }
        }
        tokens
    }

    fn split_lines(tokens: &[Token]) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut current = Line { number: 1, indented: false, words: Vec::new() };
        for token in tokens {
            match token {
                Token::Indent => current.indented = true,
                Token::Text(s) => current.words.push(s.clone()),
                Token::Newline => {
                    let next = current.number + 1;
                    let done = std::mem::replace(&mut current, Line { number: next, indented: false, words: Vec::new() });
                    if !done.words.is_empty() { lines.push(done); }
                }
            }
        }
        if !current.words.is_empty() { lines.push(current); }
        lines
    }
}
