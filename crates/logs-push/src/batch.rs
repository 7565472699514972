// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size-bounded accumulation of entries waiting to be encoded.

use crate::codec::{EncodedBatch, Encoder};
use crate::entry::Entry;
use crate::errors::EncodeError;

/// Ordered entries bounded by a byte budget.
///
/// The budget is declared, not enforced by [`Batch::add`]: callers that care
/// check [`Batch::size_bytes_after`] first. The debug sink uses a budget far
/// above anything it accumulates.
#[derive(Debug, Clone)]
pub struct Batch {
    entries: Vec<Entry>,
    size_bytes: usize,
    max_bytes: usize,
}

impl Batch {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: Vec::new(),
            size_bytes: 0,
            max_bytes,
        }
    }

    #[must_use]
    pub fn with_entries(max_bytes: usize, entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut batch = Self::new(max_bytes);
        for entry in entries {
            batch.add(entry);
        }
        batch
    }

    /// Appends unconditionally.
    pub fn add(&mut self, entry: Entry) {
        self.size_bytes += entry.line().len();
        self.entries.push(entry);
    }

    /// Size the batch would have after adding `entry`.
    #[must_use]
    pub fn size_bytes_after(&self, entry: &Entry) -> usize {
        self.size_bytes + entry.line().len()
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Encodes the current contents. The batch is left untouched whether or
    /// not encoding succeeds.
    pub fn encode(&self, encoder: &dyn Encoder) -> Result<EncodedBatch, EncodeError> {
        let payload = encoder.encode(&self.entries)?;
        Ok(EncodedBatch {
            payload,
            entries: self.entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PushRequestEncoder;
    use crate::entry::LabelSet;
    use chrono::{TimeZone, Utc};

    fn entry(labels: LabelSet, line: &str) -> Entry {
        Entry::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), labels, line)
    }

    #[test]
    fn test_add_tracks_size() {
        let mut batch = Batch::new(100);
        assert!(batch.is_empty());

        batch.add(entry(LabelSet::new().with("job", "a"), "12345"));
        batch.add(entry(LabelSet::new().with("job", "b"), "123"));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_bytes(), 8);
        assert_eq!(batch.max_bytes(), 100);
        assert_eq!(
            batch.size_bytes_after(&entry(LabelSet::new(), "12")),
            10
        );
    }

    #[test]
    fn test_add_ignores_budget() {
        let mut batch = Batch::new(2);
        batch.add(entry(LabelSet::new().with("job", "a"), "longer than two bytes"));
        assert_eq!(batch.len(), 1);
        assert!(batch.size_bytes() > batch.max_bytes());
    }

    #[test]
    fn test_with_entries_keeps_order() {
        let batch = Batch::with_entries(
            100,
            vec![
                entry(LabelSet::new().with("job", "a"), "l1"),
                entry(LabelSet::new().with("job", "a"), "l2"),
            ],
        );
        let lines: Vec<&str> = batch.entries().iter().map(Entry::line).collect();
        assert_eq!(lines, vec!["l1", "l2"]);
    }

    #[test]
    fn test_encode_is_idempotent_and_does_not_mutate() {
        let batch = Batch::with_entries(
            100,
            vec![
                entry(LabelSet::new().with("job", "a"), "l1"),
                entry(LabelSet::new().with("job", "b"), "l2"),
            ],
        );
        let encoder = PushRequestEncoder::default();

        let first = batch.encode(&encoder).unwrap();
        let second = batch.encode(&encoder).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.entries, 2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_bytes(), 4);
    }

    #[test]
    fn test_failed_encode_keeps_contents() {
        let mut batch = Batch::new(100);
        batch.add(entry(LabelSet::new().with("bad-name", "a"), "l1"));

        assert!(batch.encode(&PushRequestEncoder::default()).is_err());
        assert_eq!(batch.len(), 1);

        batch.add(entry(LabelSet::new().with("job", "a"), "l2"));
        assert_eq!(batch.len(), 2);
    }
}
