//! Text guard applied to raw user input before any LLM call.
//!
//! Checks run in a fixed order and short-circuit on the first failure, so a
//! rejection always carries exactly one reason. The guard is pure: no
//! logging, no side effects.

use crate::guard::ValidationOutcome;
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;

const MIN_CHARS: usize = 5;
const MAX_CHARS: usize = 500;

/// Layers of percent-decoding attempted before the input is treated as a
/// layered-encoding attack.
const MAX_DECODE_DEPTH: usize = 15;

lazy_static! {
    static ref INJECTION_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|UNION|EXEC|ALTER|TRUNCATE|REPLACE)\b")
            .unwrap(),
        Regex::new(r"--").unwrap(),
        Regex::new(r";").unwrap(),
        Regex::new(r"' OR '1'='1").unwrap(),
        Regex::new(r#"" OR "1"="1"#).unwrap(),
        Regex::new(r"(?i)\bOR\b\s+\d+=\d+").unwrap(),
    ];
}

/// Structural and security checks for natural-language query text.
pub struct TextGuard {
    min_chars: usize,
    max_chars: usize,
}

impl TextGuard {
    pub fn new() -> Self {
        Self::with_bounds(MIN_CHARS, MAX_CHARS)
    }

    pub fn with_bounds(min_chars: usize, max_chars: usize) -> Self {
        Self {
            min_chars,
            max_chars,
        }
    }

    /// Fixed check order: length, control characters, supplementary-plane
    /// characters, character allow-list, repeated symbols, injection
    /// patterns, markup, encoded payloads.
    pub fn validate(&self, text: &str) -> ValidationOutcome {
        // Length is counted in characters, not bytes.
        let length = text.chars().count();
        if length < self.min_chars || length > self.max_chars {
            return ValidationOutcome::rejected(format!(
                "Input text must be between {} and {} characters",
                self.min_chars, self.max_chars
            ));
        }

        if text.chars().any(|c| c.is_ascii_control()) {
            return ValidationOutcome::rejected("Input text contains control characters");
        }

        // Anything outside the Basic Multilingual Plane (emoji and friends).
        if text.chars().any(|c| c as u32 >= 0x10000) {
            return ValidationOutcome::rejected("Input text contains emoji");
        }

        if text.chars().any(|c| !is_allowed_char(c)) {
            return ValidationOutcome::rejected("Input text contains invalid symbols");
        }

        if has_repeated_run(text) {
            return ValidationOutcome::rejected("Input text contains repeated symbols");
        }

        if INJECTION_PATTERNS.iter().any(|p| p.is_match(text)) {
            return ValidationOutcome::rejected("Input text contains SQL injection patterns");
        }

        // Any transform by the sanitizer means a markup payload was present.
        if ammonia::clean(text) != text {
            return ValidationOutcome::rejected("Input text contains XSS attack patterns");
        }

        // Note: the decoded text is intentionally not re-run through the
        // checks above; only failure to reach a fixed point is rejected.
        if !reaches_decode_fixed_point(text, MAX_DECODE_DEPTH) {
            return ValidationOutcome::rejected("Input text contains encoded attack patterns");
        }

        ValidationOutcome::Passed
    }
}

impl Default for TextGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Latin letters, digits, Hangul syllables, whitespace, and a small
/// punctuation set.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('\u{AC00}'..='\u{D7A3}').contains(&c)
        || c.is_whitespace()
        || matches!(c, '.' | ',' | '!' | '?' | '%' | '~' | '(' | ')' | '-')
}

/// The regex crate has no backreferences, so the run scan is hand-rolled.
fn has_repeated_run(text: &str) -> bool {
    let mut run = 0usize;
    let mut previous: Option<char> = None;
    for c in text.chars() {
        if previous == Some(c) {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            run = 1;
            previous = Some(c);
        }
    }
    false
}

/// Percent-decode iteratively until the text stops changing. Returns false
/// when `max_depth` iterations never reach a fixed point.
fn reaches_decode_fixed_point(text: &str, max_depth: usize) -> bool {
    let mut current = text.to_string();
    for _ in 0..max_depth {
        let decoded = percent_decode_str(&current).decode_utf8_lossy().into_owned();
        if decoded == current {
            return true;
        }
        current = decoded;
    }
    false
}
