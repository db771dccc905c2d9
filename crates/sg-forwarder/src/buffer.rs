// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-destination accumulation of formatted records.
//!
//! Records are appended to an in-progress sequence keyed by destination. When a sequence
//! reaches the threshold it is removed from the map and handed back as a [`Batch`] in the same
//! critical section, so two producers can never observe the same flush and no record crosses
//! a batch boundary twice.
//!
//! ```text
//!   append(key, record)
//!        │
//!        v
//!   shard = hash(key) % SHARDS ──> lock shard
//!        │
//!        ├─ len < threshold ─> keep buffering, None
//!        └─ len == threshold ─> remove entry, Some(Batch)
//! ```
//!
//! The map is striped across [`SHARDS`] mutexes so producers writing to different destinations
//! rarely contend.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of independently locked partitions of the buffer map.
pub const SHARDS: usize = 16;

/// A finalized group of records for a single write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub destination_key: String,
    pub records: Vec<String>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug)]
pub struct PerKeyBuffer {
    threshold: NonZeroUsize,
    shards: Vec<Mutex<HashMap<String, Vec<String>>>>,
}

impl PerKeyBuffer {
    #[must_use]
    pub fn new(threshold: NonZeroUsize) -> Self {
        let shards = (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect();
        PerKeyBuffer { threshold, shards }
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold.get()
    }

    /// Appends `record` under `key`; returns the full sequence once it reaches the threshold.
    ///
    /// With a threshold of 1 nothing is ever stored.
    pub fn append(&self, key: &str, record: String) -> Option<Batch> {
        let threshold = self.threshold.get();
        if threshold == 1 {
            return Some(Batch {
                destination_key: key.to_string(),
                records: vec![record],
            });
        }

        let mut shard = self.lock_shard(key);
        let records = shard
            .entry(key.to_string())
            .or_insert_with(|| Vec::with_capacity(threshold));
        records.push(record);
        if records.len() < threshold {
            return None;
        }

        shard.remove_entry(key).map(|(destination_key, records)| Batch {
            destination_key,
            records,
        })
    }

    /// Number of records currently waiting under `key`.
    #[cfg(test)]
    pub(crate) fn pending(&self, key: &str) -> usize {
        self.lock_shard(key).get(key).map_or(0, Vec::len)
    }

    /// Total number of records waiting across all keys.
    #[cfg(test)]
    pub(crate) fn pending_records(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .map(Vec::len)
                    .sum::<usize>()
            })
            .sum()
    }

    fn lock_shard(&self, key: &str) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() as usize) % self.shards.len();
        // A panicking producer cannot leave an entry half-written: every mutation is a single
        // push or remove.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn buffer(threshold: usize) -> PerKeyBuffer {
        PerKeyBuffer::new(NonZeroUsize::new(threshold).unwrap())
    }

    #[test]
    fn test_threshold_one_never_accumulates() {
        let buffer = buffer(1);
        for i in 0..5 {
            let batch = buffer.append("logs-h1", format!("r{i}")).unwrap();
            assert_eq!(batch.destination_key, "logs-h1");
            assert_eq!(batch.records, vec![format!("r{i}")]);
        }
        assert_eq!(buffer.pending_records(), 0);
    }

    #[test]
    fn test_flushes_exactly_at_threshold() {
        let buffer = buffer(3);
        assert!(buffer.append("a", "1".to_string()).is_none());
        assert!(buffer.append("a", "2".to_string()).is_none());
        assert_eq!(buffer.pending("a"), 2);

        let batch = buffer.append("a", "3".to_string()).unwrap();
        assert_eq!(batch.records, vec!["1", "2", "3"]);
        assert_eq!(buffer.pending("a"), 0);
        assert_eq!(buffer.pending_records(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let buffer = buffer(2);
        assert!(buffer.append("a", "a1".to_string()).is_none());
        assert!(buffer.append("b", "b1".to_string()).is_none());

        let batch = buffer.append("b", "b2".to_string()).unwrap();
        assert_eq!(batch.destination_key, "b");
        assert_eq!(batch.records, vec!["b1", "b2"]);
        assert_eq!(buffer.pending("a"), 1);
    }

    #[test]
    fn test_entry_is_recreated_after_flush() {
        let buffer = buffer(2);
        buffer.append("a", "1".to_string());
        buffer.append("a", "2".to_string()).unwrap();
        assert!(buffer.append("a", "3".to_string()).is_none());
        assert_eq!(buffer.pending("a"), 1);
    }

    #[test]
    fn test_concurrent_appends_account_for_every_record() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 250;
        let buffer = Arc::new(buffer(7));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    let mut batches = Vec::new();
                    for i in 0..PER_PRODUCER {
                        let key = if i % 2 == 0 { "shared" } else { "other" };
                        if let Some(batch) = buffer.append(key, format!("{producer}-{i}")) {
                            batches.push(batch);
                        }
                    }
                    batches
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut flushed = 0;
        for handle in handles {
            for batch in handle.join().unwrap() {
                assert_eq!(batch.len(), 7);
                for record in batch.records {
                    assert!(seen.insert(record), "record flushed twice");
                    flushed += 1;
                }
            }
        }

        assert_eq!(flushed + buffer.pending_records(), PRODUCERS * PER_PRODUCER);
    }

    proptest! {
        #[test]
        fn prop_threshold_th_append_returns_all_in_order(threshold in 1usize..64) {
            let buffer = buffer(threshold);
            let records: Vec<String> = (0..threshold).map(|i| format!("record-{i}")).collect();

            for (i, record) in records.iter().enumerate() {
                let result = buffer.append("key", record.clone());
                if i + 1 < threshold {
                    prop_assert!(result.is_none());
                } else {
                    let batch = result.unwrap();
                    prop_assert_eq!(&batch.records, &records);
                }
            }
            prop_assert_eq!(buffer.pending("key"), 0);
        }
    }
}
