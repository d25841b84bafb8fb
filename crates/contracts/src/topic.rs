//! Topic patterns
//!
//! `/`-separated subscription patterns with `+` (exactly one segment) and
//! `#` (the final segment plus everything after it, possibly nothing).
//! Literal segments compare byte-exact; empty segments are significant.

use std::fmt;

use crate::ContractError;

/// Single-level wildcard segment
pub const WILDCARD_SINGLE: &str = "+";
/// Multi-level wildcard segment
pub const WILDCARD_MULTI: &str = "#";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    SingleLevel,
    MultiLevel,
}

/// Validated subscription pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Parse and validate a pattern
    ///
    /// # Errors
    /// - empty pattern
    /// - wildcard sharing a segment with other characters (`a+`, `#b`)
    /// - `#` anywhere but the final segment
    pub fn parse(raw: impl Into<String>) -> Result<Self, ContractError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ContractError::invalid_topic_pattern(
                raw,
                "pattern cannot be empty",
            ));
        }

        let parts: Vec<&str> = raw.split('/').collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());

        for (idx, part) in parts.iter().enumerate() {
            let segment = match *part {
                WILDCARD_SINGLE => Segment::SingleLevel,
                WILDCARD_MULTI if idx == last => Segment::MultiLevel,
                WILDCARD_MULTI => {
                    return Err(ContractError::invalid_topic_pattern(
                        raw.as_str(),
                        "'#' must be the last segment",
                    ));
                }
                other if other.contains(['+', '#']) => {
                    return Err(ContractError::invalid_topic_pattern(
                        raw.as_str(),
                        format!("wildcard must occupy a whole segment, got '{other}'"),
                    ));
                }
                other => Segment::Literal(other.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { raw, segments })
    }

    /// Original pattern string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern contains any wildcard
    pub fn has_wildcards(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// Check whether a concrete topic matches this pattern
    pub fn matches(&self, topic: &str) -> bool {
        self.walk(topic, |_| {})
    }

    /// Topic segments consumed by wildcards, in pattern order
    ///
    /// `+` yields its single segment, `#` yields the remaining tail joined by `/`
    /// (empty when nothing remains). Returns `None` when the topic does not match.
    pub fn captures<'t>(&self, topic: &'t str) -> Option<Vec<&'t str>> {
        let mut captured = Vec::new();
        if self.walk(topic, |segment| captured.push(segment)) {
            Some(captured)
        } else {
            None
        }
    }

    fn walk<'t>(&self, topic: &'t str, mut on_capture: impl FnMut(&'t str)) -> bool {
        let mut rest = Some(topic);

        for segment in &self.segments {
            match segment {
                Segment::MultiLevel => {
                    on_capture(rest.unwrap_or(""));
                    return true;
                }
                Segment::SingleLevel => match next_segment(&mut rest) {
                    Some(level) => on_capture(level),
                    None => return false,
                },
                Segment::Literal(literal) => match next_segment(&mut rest) {
                    Some(level) if level == literal => {}
                    _ => return false,
                },
            }
        }

        rest.is_none()
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Match a raw pattern string against a topic
///
/// An invalid pattern never matches.
pub fn matches(pattern: &str, topic: &str) -> bool {
    TopicPattern::parse(pattern)
        .map(|p| p.matches(topic))
        .unwrap_or(false)
}

fn next_segment<'t>(rest: &mut Option<&'t str>) -> Option<&'t str> {
    let current = rest.take()?;
    match current.find('/') {
        Some(idx) => {
            *rest = Some(&current[idx + 1..]);
            Some(&current[..idx])
        }
        None => Some(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_cases() {
        assert!(matches("a/+/c", "a/b/c"));
        assert!(!matches("a/+/c", "a/b/x/c"));
        assert!(matches("a/#", "a/b/c"));
        assert!(matches("a/#", "a"));
        assert!(matches("a/+", "a/"));
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        assert!(matches("sensors/kitchen", "sensors/kitchen"));
        assert!(!matches("sensors/kitchen", "sensors/Kitchen"));
        assert!(!matches("sensors/kitchen", "sensors/kitchen/temp"));
        assert!(!matches("sensors/kitchen/temp", "sensors/kitchen"));
    }

    #[test]
    fn test_no_prefix_matching() {
        assert!(!matches("sensors/kit", "sensors/kitchen"));
        assert!(!matches("a/+", "a"));
        assert!(!matches("a/+", "a/b/c"));
    }

    #[test]
    fn test_empty_segments_are_literal() {
        assert!(matches("a//c", "a//c"));
        assert!(!matches("a//c", "a/b/c"));
        assert!(matches("+/b", "/b"));
        assert!(matches("a/+/c", "a//c"));
        assert!(!matches("a/b", "a/b/"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(matches("#", "anything/at/all"));
        assert!(matches("#", ""));
        assert!(matches("a/+/#", "a/b"));
        assert!(matches("a/+/#", "a/b/c/d"));
        assert!(!matches("a/+/#", "x/b/c"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(TopicPattern::parse("").is_err());
        assert!(TopicPattern::parse("a/#/c").is_err());
        assert!(TopicPattern::parse("a/b+").is_err());
        assert!(TopicPattern::parse("a/#b").is_err());
        assert!(TopicPattern::parse("a/+/#").is_ok());
        assert!(!matches("a/#/c", "a/b/c"));
    }

    #[test]
    fn test_captures() {
        let pattern = TopicPattern::parse("sensors/+/temp").unwrap();
        assert_eq!(pattern.captures("sensors/kitchen/temp"), Some(vec!["kitchen"]));
        assert_eq!(pattern.captures("sensors/kitchen/humidity"), None);

        let tail = TopicPattern::parse("tele/+/#").unwrap();
        assert_eq!(
            tail.captures("tele/plug1/SENSOR/ENERGY"),
            Some(vec!["plug1", "SENSOR/ENERGY"])
        );
        assert_eq!(tail.captures("tele/plug1"), Some(vec!["plug1", ""]));
    }

    #[test]
    fn test_matches_is_deterministic() {
        let pattern = TopicPattern::parse("a/+/c").unwrap();
        for _ in 0..3 {
            assert!(pattern.matches("a/b/c"));
            assert!(!pattern.matches("a/b/d"));
        }
        assert!(pattern.has_wildcards());
        assert!(!TopicPattern::parse("a/b").unwrap().has_wildcards());
    }
}
