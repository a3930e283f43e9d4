// src/analysis/frequency.rs

//! Byte-pair adjacency counters.

/// Counters stop at this value instead of wrapping.
pub const SATURATION: u8 = u8::MAX;

/// A 256×256 table of saturating counters indexed by
/// `(previous byte, current byte)`.
pub struct FrequencyMatrix {
    counts: Box<[[u8; 256]; 256]>,
}

impl std::fmt::Debug for FrequencyMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self
            .counts
            .iter()
            .map(|row| row.iter().filter(|c| **c != 0).count())
            .sum::<usize>();
        f.debug_struct("FrequencyMatrix")
            .field("nonzero_pairs", &used)
            .finish()
    }
}

impl Default for FrequencyMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyMatrix {
    pub fn new() -> Self {
        Self {
            counts: Box::new([[0u8; 256]; 256]),
        }
    }

    /// Counts one occurrence of `cur` following `prev` and returns the new
    /// (saturated) count.
    pub fn observe(&mut self, prev: u8, cur: u8) -> u8 {
        let slot = &mut self.counts[prev as usize][cur as usize];
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Counts every adjacent pair inside `chunk`: `n` bytes give `n - 1`
    /// observations. Pairs spanning two chunks are not counted.
    pub fn observe_chunk(&mut self, chunk: &[u8]) {
        for pair in chunk.windows(2) {
            self.observe(pair[0], pair[1]);
        }
    }

    pub fn count(&self, prev: u8, cur: u8) -> u8 {
        self.counts[prev as usize][cur as usize]
    }

    pub fn reset(&mut self) {
        for row in self.counts.iter_mut() {
            row.fill(0);
        }
    }

    /// Maps the pair's count linearly onto `0..buckets`; a zero count is
    /// always bucket 0.
    pub fn intensity(&self, prev: u8, cur: u8, buckets: usize) -> usize {
        bucket_for(self.count(prev, cur), buckets)
    }
}

pub fn bucket_for(count: u8, buckets: usize) -> usize {
    if buckets == 0 {
        return 0;
    }
    count as usize * buckets / (SATURATION as usize + 1)
}
