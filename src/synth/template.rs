use crate::error::RuleError;
use regex::{Regex, RegexBuilder};

pub const PLACEHOLDER: &str = "%DIGITS%";

/// A hostname template with its pre-compiled recognizer.
///
/// Literal text around the placeholder is matched verbatim and
/// case-insensitively; the placeholder accepts one or more hex digits and the
/// whole hostname must match.
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    template: String,
    head: String,
    tail: String,
    pattern: Regex,
}

impl TemplateMatcher {
    pub fn compile(template: &str) -> Result<Self, RuleError> {
        if template.matches(PLACEHOLDER).count() != 1 {
            return Err(RuleError::Placeholder { placeholder: PLACEHOLDER, template: template.to_string() });
        }
        let (head, tail) = template
            .split_once(PLACEHOLDER)
            .ok_or_else(|| RuleError::Placeholder { placeholder: PLACEHOLDER, template: template.to_string() })?;

        let source = format!("^{}([0-9a-f]+){}$", regex::escape(head), regex::escape(tail));
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| RuleError::Pattern(e.to_string()))?;

        Ok(Self { template: template.to_string(), head: head.to_string(), tail: tail.to_string(), pattern })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Extract the lowercase digit span from a conforming hostname.
    pub fn match_digits(&self, hostname: &str) -> Option<String> {
        let caps = self.pattern.captures(hostname)?;
        caps.get(1).map(|m| m.as_str().to_ascii_lowercase())
    }

    pub fn render(&self, digits: &str) -> String {
        let mut out = String::with_capacity(self.head.len() + digits.len() + self.tail.len());
        out.push_str(&self.head);
        out.push_str(digits);
        out.push_str(&self.tail);
        out
    }
}
