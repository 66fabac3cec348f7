//! Bounded output ring buffer with sequence numbers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One read from a process pipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputChunk {
    /// Monotonic per session, starting at 1, never reused across spawns.
    pub seq: u64,
    pub stream: Stream,
    pub data: String,
    pub at: DateTime<Utc>,
}

/// Keeps the newest `capacity` chunks; older ones are evicted.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    chunks: VecDeque<OutputChunk>,
    capacity: usize,
    next_seq: u64,
    evicted: u64,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next_seq: 1,
            evicted: 0,
        }
    }

    pub fn push(&mut self, stream: Stream, data: impl Into<String>) -> OutputChunk {
        let chunk = OutputChunk {
            seq: self.next_seq,
            stream,
            data: data.into(),
            at: Utc::now(),
        };
        self.next_seq += 1;
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
            self.evicted += 1;
        }
        self.chunks.push_back(chunk.clone());
        chunk
    }

    /// Chunks with `seq > since`, or every retained chunk.
    pub fn since(&self, since: Option<u64>) -> Vec<OutputChunk> {
        let since = since.unwrap_or(0);
        self.chunks.iter().filter(|c| c.seq > since).cloned().collect()
    }

    /// Retained output concatenated in order.
    pub fn text(&self) -> String {
        self.chunks.iter().map(|c| c.data.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_past_capacity() {
        let mut buffer = OutputBuffer::new(3);
        for i in 0..5 {
            buffer.push(Stream::Stdout, format!("{i}"));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.evicted(), 2);
        assert_eq!(buffer.text(), "234");
        assert_eq!(buffer.last_seq(), 5);
    }

    #[test]
    fn test_since_is_non_destructive() {
        let mut buffer = OutputBuffer::new(10);
        buffer.push(Stream::Stdout, "a");
        buffer.push(Stream::Stderr, "b");
        buffer.push(Stream::Stdout, "c");

        let tail: Vec<u64> = buffer.since(Some(1)).iter().map(|c| c.seq).collect();
        assert_eq!(tail, vec![2, 3]);
        assert_eq!(buffer.since(None).len(), 3);
        assert_eq!(buffer.since(Some(3)).len(), 0);
        assert_eq!(buffer.len(), 3);
    }
}
