//! Change events and the patterns trigger rules match them with
//!
//! Events arrive from an external change feed (settings store, secret
//! rotation notifier). A pattern matches an event when every attribute named
//! in the pattern is present on the event and its value matches.

use crate::EventId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An externally observed configuration change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Identifier assigned by the change feed
    pub id: EventId,

    /// When the change happened at the source
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Matchable attributes (`source`, `field`, `secret`, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ChangeEvent {
    pub fn new(id: impl Into<EventId>) -> Self {
        Self {
            id: id.into(),
            timestamp: chrono::Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Attribute set a trigger rule watches for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPattern(BTreeMap<String, AttributeMatcher>);

impl EventPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), AttributeMatcher::Exact(value.into()));
        self
    }

    pub fn present(mut self, key: impl Into<String>) -> Self {
        self.0.insert(key.into(), AttributeMatcher::Any);
        self
    }

    pub fn prefix(mut self, key: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.0.insert(key.into(), AttributeMatcher::Prefix(prefix.into()));
        self
    }

    /// An empty pattern matches nothing
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        !self.0.is_empty()
            && self.0.iter().all(|(key, matcher)| {
                event
                    .attribute(key)
                    .is_some_and(|value| matcher.matches(value))
            })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How one attribute value is matched
///
/// Written in configuration as a plain string: `*` matches any value,
/// a trailing `*` matches a prefix, anything else is compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeMatcher {
    Exact(String),
    Prefix(String),
    Any,
}

impl AttributeMatcher {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            AttributeMatcher::Exact(expected) => value == expected,
            AttributeMatcher::Prefix(prefix) => value.starts_with(prefix.as_str()),
            AttributeMatcher::Any => true,
        }
    }
}

impl From<String> for AttributeMatcher {
    fn from(raw: String) -> Self {
        if raw == "*" {
            AttributeMatcher::Any
        } else if let Some(prefix) = raw.strip_suffix('*') {
            AttributeMatcher::Prefix(prefix.to_string())
        } else {
            AttributeMatcher::Exact(raw)
        }
    }
}

impl From<AttributeMatcher> for String {
    fn from(matcher: AttributeMatcher) -> Self {
        match matcher {
            AttributeMatcher::Exact(value) => value,
            AttributeMatcher::Prefix(prefix) => format!("{prefix}*"),
            AttributeMatcher::Any => "*".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn auth_provider_pattern() -> EventPattern {
        EventPattern::new()
            .exact("source", "settings")
            .exact("field", "authProvider")
    }

    #[test]
    fn test_exact_match_requires_every_key() {
        let pattern = auth_provider_pattern();
        let event = ChangeEvent::new("e1")
            .with_attribute("source", "settings")
            .with_attribute("field", "authProvider")
            .with_attribute("value", "github");
        assert!(pattern.matches(&event));

        let partial = ChangeEvent::new("e2").with_attribute("source", "settings");
        assert!(!pattern.matches(&partial));

        let other = ChangeEvent::new("e3")
            .with_attribute("source", "settings")
            .with_attribute("field", "smtpHost");
        assert!(!pattern.matches(&other));
    }

    #[test]
    fn test_wildcards() {
        let pattern = EventPattern::new()
            .present("secret")
            .prefix("field", "storage.");
        let event = ChangeEvent::new("e1")
            .with_attribute("secret", "jwt")
            .with_attribute("field", "storage.fileSizeLimit");
        assert!(pattern.matches(&event));

        let miss = ChangeEvent::new("e2")
            .with_attribute("secret", "jwt")
            .with_attribute("field", "auth.siteUrl");
        assert!(!pattern.matches(&miss));
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        let event = ChangeEvent::new("e1").with_attribute("source", "settings");
        assert!(!EventPattern::new().matches(&event));
    }

    #[test]
    fn test_pattern_round_trips_through_plain_strings() {
        let json = r#"{"source":"settings","field":"storage.*","secret":"*"}"#;
        let pattern: EventPattern = serde_json::from_str(json).unwrap();
        assert_eq!(
            pattern,
            EventPattern::new()
                .exact("source", "settings")
                .prefix("field", "storage.")
                .present("secret")
        );
    }

    #[test]
    fn test_event_timestamp_defaults_when_missing() {
        let event: ChangeEvent =
            serde_json::from_str(r#"{"id":"evt-1","attributes":{"source":"settings"}}"#).unwrap();
        assert_eq!(event.id.as_str(), "evt-1");
        assert_eq!(event.attribute("source"), Some("settings"));
    }

    proptest! {
        /// Matcher strings without an interior `*` survive a round trip.
        #[test]
        fn matcher_strings_round_trip(body in "[a-zA-Z0-9._-]{0,12}", wildcard in any::<bool>()) {
            let raw = if wildcard { format!("{body}*") } else { body.clone() };
            let matcher = AttributeMatcher::from(raw.clone());
            prop_assert_eq!(String::from(matcher), raw);
        }

        /// A pattern built from an event's own attributes always matches it,
        /// and stops matching once a required key is absent.
        #[test]
        fn pattern_over_own_attributes_matches(
            attributes in prop::collection::btree_map("[a-z]{1,6}", "[a-zA-Z0-9.]{0,10}", 1..6),
            cut in 0usize..10,
        ) {
            let mut event = ChangeEvent::new("evt");
            let mut pattern = EventPattern::new();
            for (i, (key, value)) in attributes.iter().enumerate() {
                event = event.with_attribute(key.clone(), value.clone());
                pattern = match i % 3 {
                    0 => pattern.exact(key.clone(), value.clone()),
                    1 => pattern.prefix(key.clone(), value.chars().take(cut).collect::<String>()),
                    _ => pattern.present(key.clone()),
                };
            }
            prop_assert!(pattern.matches(&event));

            let missing = pattern.clone().present("zz-absent");
            prop_assert!(!missing.matches(&event));
        }
    }
}
