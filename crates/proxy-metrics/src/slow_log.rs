// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

/// One slow operation and how long it took.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowRecord {
    #[serde(rename = "slow_log")]
    pub description: String,
    #[serde(rename = "lats")]
    pub latency_seconds: f64,
}

impl SlowRecord {
    pub fn new(description: impl Into<String>, latency: Duration) -> Self {
        Self {
            description: description.into(),
            latency_seconds: latency.as_secs_f64(),
        }
    }
}

/// Fixed capacity ring of slow records. Once full, each write replaces the
/// slot at `next_write_index % capacity`.
#[derive(Debug)]
pub struct SlowRecordBuffer {
    capacity: usize,
    next_write_index: u64,
    records: Vec<SlowRecord>,
}

impl SlowRecordBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_write_index: 0,
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: SlowRecord) {
        if self.records.len() < self.capacity {
            self.records.push(record);
        } else if self.capacity > 0 {
            let slot = (self.next_write_index % self.capacity as u64) as usize;
            self.records[slot] = record;
        }
        self.next_write_index += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of writes, including the ones that were overwritten.
    pub fn write_count(&self) -> u64 {
        self.next_write_index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the buffer, returning records oldest first.
    pub fn into_records(self) -> Vec<SlowRecord> {
        let mut records = self.records;
        if self.capacity > 0 && self.next_write_index > self.capacity as u64 {
            let oldest = (self.next_write_index % self.capacity as u64) as usize;
            records.rotate_left(oldest);
        }
        records
    }
}

/// Shared slow log. Producers append under a short lock; the reporting loop
/// swaps the whole buffer out and drains it without holding the lock.
#[derive(Debug)]
pub struct SlowLogRecorder {
    capacity: usize,
    active: Mutex<SlowRecordBuffer>,
}

impl SlowLogRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            active: Mutex::new(SlowRecordBuffer::new(capacity)),
        }
    }

    pub fn record(&self, description: impl Into<String>, latency: Duration) {
        let record = SlowRecord::new(description, latency);
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.push(record);
    }

    /// Replaces the active buffer with an empty one and returns the previous
    /// buffer. Every record pushed before the swap is in the returned buffer,
    /// every record pushed after it is in the new one.
    pub fn rotate(&self) -> SlowRecordBuffer {
        let fresh = SlowRecordBuffer::new(self.capacity);
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *active, fresh)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn descriptions(buffer: SlowRecordBuffer) -> Vec<String> {
        buffer
            .into_records()
            .into_iter()
            .map(|r| r.description)
            .collect()
    }

    #[test]
    fn test_rotation_does_not_leak() {
        let recorder = SlowLogRecorder::new(3);
        for name in ["A", "B", "C", "D"] {
            recorder.record(name, Duration::from_millis(10));
        }

        let drained = recorder.rotate();
        assert_eq!(drained.write_count(), 4);
        assert_eq!(descriptions(drained), vec!["B", "C", "D"]);

        recorder.record("E", Duration::from_millis(10));
        assert_eq!(descriptions(recorder.rotate()), vec!["E"]);
    }

    #[test]
    fn test_rotate_empty() {
        let recorder = SlowLogRecorder::new(8);
        let drained = recorder.rotate();
        assert!(drained.is_empty());
        assert_eq!(drained.capacity(), 8);
    }

    #[test]
    fn test_latency_kept_exactly() {
        let recorder = SlowLogRecorder::new(2);
        recorder.record("get k1", Duration::from_millis(1500));
        let records = recorder.rotate().into_records();
        assert_eq!(
            records,
            vec![SlowRecord {
                description: "get k1".to_string(),
                latency_seconds: 1.5,
            }]
        );
    }

    #[test]
    fn test_zero_capacity_discards() {
        let recorder = SlowLogRecorder::new(0);
        recorder.record("dropped", Duration::from_secs(1));
        let drained = recorder.rotate();
        assert!(drained.is_empty());
        assert_eq!(drained.write_count(), 1);
    }

    #[test]
    fn test_serialized_field_names() {
        let record = SlowRecord::new("scan t1", Duration::from_millis(250));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"slow_log": "scan t1", "lats": 0.25}));
    }

    #[test]
    fn test_concurrent_record_and_rotate() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;

        // large enough that nothing is overwritten within a single window
        let recorder = Arc::new(SlowLogRecorder::new(PRODUCERS * PER_PRODUCER));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        recorder.record(format!("{p}-{i}"), Duration::from_millis(1));
                    }
                })
            })
            .collect();

        let drainer = {
            let recorder = Arc::clone(&recorder);
            thread::spawn(move || {
                let mut drained = Vec::new();
                for _ in 0..20 {
                    drained.extend(recorder.rotate().into_records());
                    thread::yield_now();
                }
                drained
            })
        };

        for producer in producers {
            producer.join().unwrap();
        }
        let mut all = drainer.join().unwrap();
        all.extend(recorder.rotate().into_records());

        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
        let unique: HashSet<_> = all.iter().map(|r| r.description.clone()).collect();
        assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);
    }

    proptest! {
        #[test]
        fn ring_keeps_most_recent(capacity in 1usize..32, n in 0usize..128) {
            let recorder = SlowLogRecorder::new(capacity);
            for i in 0..n {
                recorder.record(format!("op-{i}"), Duration::from_millis(i as u64));
            }
            let records = recorder.rotate().into_records();

            prop_assert_eq!(records.len(), n.min(capacity));
            let first = n.saturating_sub(capacity);
            for (offset, record) in records.iter().enumerate() {
                let i = first + offset;
                prop_assert_eq!(&record.description, &format!("op-{i}"));
                prop_assert_eq!(record.latency_seconds, Duration::from_millis(i as u64).as_secs_f64());
            }
        }
    }
}
