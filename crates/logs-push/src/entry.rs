// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log entries and the label sets that identify their stream.

use chrono::{DateTime, FixedOffset, Offset, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical, key-ordered set of labels.
///
/// The string form is stable: keys are sorted and values quoted, e.g.
/// `{env="prod", job="api"}`. That string is also what the encoder uses to
/// group entries into streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a label, returning the updated set.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Merges `other` into this set. Labels already present here win.
    pub fn merge_missing(&mut self, other: &LabelSet) {
        for (name, value) in &other.0 {
            self.0
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}=\"")?;
            for c in value.chars() {
                match c {
                    '\\' => f.write_str("\\\\")?,
                    '"' => f.write_str("\\\"")?,
                    '\n' => f.write_str("\\n")?,
                    '\t' => f.write_str("\\t")?,
                    '\r' => f.write_str("\\r")?,
                    c if c.is_control() => write!(f, "{}", c.escape_default())?,
                    c => write!(f, "{c}")?,
                }
            }
            f.write_str("\"")?;
        }
        f.write_str("}")
    }
}

/// A single log record. Fields are read-only once the entry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    timestamp: DateTime<FixedOffset>,
    labels: LabelSet,
    line: String,
    structured_metadata: LabelSet,
}

impl Entry {
    /// Builds an entry, keeping the offset the timestamp was produced in.
    pub fn new<Tz: TimeZone>(
        timestamp: DateTime<Tz>,
        labels: LabelSet,
        line: impl Into<String>,
    ) -> Self {
        let offset = timestamp.offset().fix();
        Self {
            timestamp: timestamp.with_timezone(&offset),
            labels,
            line: line.into(),
            structured_metadata: LabelSet::default(),
        }
    }

    /// Attaches per-entry metadata that travels with the line but is not part
    /// of the stream identity.
    #[must_use]
    pub fn with_structured_metadata(mut self, metadata: LabelSet) -> Self {
        self.structured_metadata = metadata;
        self
    }

    #[must_use]
    pub fn timestamp(&self) -> &DateTime<FixedOffset> {
        &self.timestamp
    }

    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    #[must_use]
    pub fn structured_metadata(&self) -> &LabelSet {
        &self.structured_metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_label_set_canonical_order() {
        let labels = LabelSet::new().with("job", "api").with("env", "prod");
        assert_eq!(labels.to_string(), r#"{env="prod", job="api"}"#);
    }

    #[test]
    fn test_label_set_empty() {
        assert_eq!(LabelSet::new().to_string(), "{}");
        assert!(LabelSet::new().is_empty());
    }

    #[test]
    fn test_label_set_escapes_values() {
        let labels = LabelSet::new().with("msg", "say \"hi\"\\\n");
        assert_eq!(labels.to_string(), r#"{msg="say \"hi\"\\\n"}"#);
    }

    #[test]
    fn test_label_set_escapes_control_characters() {
        let labels = LabelSet::new().with("path", "a\tb\rc\u{7}d");
        let rendered = labels.to_string();

        assert_eq!(rendered, r#"{path="a\tb\rc\u{7}d"}"#);
        assert!(!rendered.chars().any(char::is_control));
    }

    #[test]
    fn test_label_set_merge_missing_keeps_existing() {
        let mut labels = LabelSet::new().with("job", "api");
        let external = LabelSet::new().with("job", "other").with("cluster", "eu-1");
        labels.merge_missing(&external);

        assert_eq!(labels.get("job"), Some("api"));
        assert_eq!(labels.get("cluster"), Some("eu-1"));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_entry_keeps_producer_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let ts = offset.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let entry = Entry::new(ts, LabelSet::new(), "hello");

        assert_eq!(entry.timestamp().offset().local_minus_utc(), 7200);
        assert_eq!(entry.line(), "hello");
        assert!(entry.structured_metadata().is_empty());
    }

    #[test]
    fn test_entry_from_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = Entry::new(ts, LabelSet::new().with("job", "a"), "l1")
            .with_structured_metadata(LabelSet::new().with("trace_id", "abc"));

        assert_eq!(entry.timestamp().offset().local_minus_utc(), 0);
        assert_eq!(entry.labels().get("job"), Some("a"));
        assert_eq!(entry.structured_metadata().get("trace_id"), Some("abc"));
    }
}
