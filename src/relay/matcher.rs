//! Trading-signal detection
//!
//! A fixed list of patterns. Compiled once at startup.
//!
//! Case folding is ASCII-only (`(?i-u:...)`), so `ſ` never stands in for
//! `s`. The volatility gap stops at any line terminator, not only `\n`.

use crate::error::Result;
use regex::RegexSet;

/// The patterns a message must hit to be forwarded
pub const SIGNAL_PATTERNS: &[&str] = &[
    r"(?i-u:Boom 1000 Index BUY Signal)",
    r"(?i-u:Crash 1000 Index BUY Signal)",
    r"(?i-u:Boom 1000 Index SELL Signal)",
    r"(?i-u:Crash 1000 Index SELL Signal)",
    r"(?i-u:Boom 500 Index (BUY|SELL) Signal)",
    r"(?i-u:Crash 500 Index (BUY|SELL) Signal)",
    r"(?i-u:Volatility)[^\r\n\x{2028}\x{2029}]*(?i-u:Index)[^\r\n\x{2028}\x{2029}]*(?i-u:(BUY|SELL) Signal)",
];

#[derive(Debug, Clone)]
pub struct SignalMatcher {
    patterns: RegexSet,
}

impl SignalMatcher {
    pub fn new() -> Result<Self> {
        let patterns = RegexSet::new(SIGNAL_PATTERNS)?;
        Ok(Self { patterns })
    }

    /// True if any pattern occurs anywhere in `text`. Absent or empty text never matches.
    pub fn matches(&self, text: Option<&str>) -> bool {
        match text {
            Some(text) if !text.is_empty() => self.patterns.is_match(text),
            _ => false,
        }
    }

    /// First pattern that hits, for logging
    pub fn matched_pattern(&self, text: Option<&str>) -> Option<&'static str> {
        let text = text.filter(|t| !t.is_empty())?;
        self.patterns
            .matches(text)
            .iter()
            .next()
            .map(|idx| SIGNAL_PATTERNS[idx])
    }
}
