//! Sliding sequence-number window
//!
//! A fixed-capacity bitmap over the last [`WINDOW_SIZE`] sequence numbers.
//! Bit position 0 is the reference (newest) sequence number, position `n` is
//! the sequence number `n` steps older. The same primitive backs duplicate
//! suppression, per-neighbour reception counting and own-broadcast echo
//! counting.

use std::fmt;

/// Window capacity in sequence numbers (multiple of the word size)
pub const WINDOW_SIZE: usize = 64;

const WORD_BITS: usize = u64::BITS as usize;
const NUM_WORDS: usize = WINDOW_SIZE / WORD_BITS;

/// Signed distance from `older` to `newer` under 16-bit wrapping arithmetic
pub fn seq_diff(newer: u16, older: u16) -> i32 {
    newer.wrapping_sub(older) as i16 as i32
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct SlidingWindow {
    words: [u64; NUM_WORDS],
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the window by `offset` and optionally record position 0.
    ///
    /// Returns true when position 0 was not already set after the shift,
    /// i.e. the sequence number is new information. An offset that is
    /// negative or at least [`WINDOW_SIZE`] wipes the history and counts as new.
    pub fn mark_and_test(&mut self, offset: i32, value: bool) -> bool {
        if offset < 0 || offset as usize >= WINDOW_SIZE {
            self.clear();
            if value {
                self.set(0);
            }
            return true;
        }

        self.shift(offset as usize);
        let was_set = self.is_set(0);
        if value {
            self.set(0);
        }
        !was_set
    }

    /// Record a sequence number `position` steps behind the reference without
    /// moving the window. Returns true if the slot was previously empty.
    pub fn mark_position(&mut self, position: usize) -> bool {
        if position >= WINDOW_SIZE {
            return false;
        }
        let was_set = self.is_set(position);
        self.set(position);
        !was_set
    }

    /// True if `candidate` lies inside the window anchored at `reference`
    /// and its bit is already set. Never mutates.
    pub fn status(&self, reference: u16, candidate: u16) -> bool {
        let diff = reference.wrapping_sub(candidate) as usize;
        diff < WINDOW_SIZE && self.is_set(diff)
    }

    /// Number of sequence numbers recorded in the window
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn clear(&mut self) {
        self.words = [0; NUM_WORDS];
    }

    pub fn is_set(&self, position: usize) -> bool {
        if position >= WINDOW_SIZE {
            return false;
        }
        self.words[position / WORD_BITS] & (1u64 << (position % WORD_BITS)) != 0
    }

    fn set(&mut self, position: usize) {
        self.words[position / WORD_BITS] |= 1u64 << (position % WORD_BITS);
    }

    /// Age every recorded bit by `n` positions, discarding the oldest
    fn shift(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        if n >= WINDOW_SIZE {
            self.clear();
            return;
        }

        let word_shift = n / WORD_BITS;
        let bit_shift = n % WORD_BITS;

        for i in (0..NUM_WORDS).rev() {
            let mut value = 0u64;
            if i >= word_shift {
                let src = i - word_shift;
                value = self.words[src] << bit_shift;
                if bit_shift > 0 && src > 0 {
                    value |= self.words[src - 1] >> (WORD_BITS - bit_shift);
                }
            }
            self.words[i] = value;
        }
    }
}

impl fmt::Debug for SlidingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlidingWindow(")?;
        for word in self.words.iter().rev() {
            write!(f, "{:016x}", word)?;
        }
        write!(f, ", count={})", self.count())
    }
}
