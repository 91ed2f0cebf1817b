//! Sparse, cell-indexed memory.
//!
//! # Representation
//!
//! A small dense prefix (the first [`DENSE_LEN`] cells) backs the
//! overwhelming majority of reads and writes; cells beyond it spill into a
//! sparse overflow map. Reading an unset cell never grows storage, and
//! writing `ZERO` to an overflow cell erases its entry rather than storing
//! a redundant zero.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{Index, Number};

/// Cells held inline before spilling to the overflow map.
const DENSE_LEN: usize = 16;

/// An error caused by a [`Memory`] operation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// Access with a negative cell index.
    #[error("negative memory index: {0}")]
    NegativeIndex(Index),
}

/// Sparse, non-negatively indexed memory of [`Number`] cells.
///
/// Unset cells read as [`Number::zero`]. Negative indices are never valid
/// and every accessor returns [`Error::NegativeIndex`] for them.
#[derive(Clone, Debug, Default, Eq)]
pub struct Memory {
    dense: [Number; DENSE_LEN],
    overflow: BTreeMap<Index, Number>,
}

impl Memory {
    /// Constructs an empty memory, all cells implicitly zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the value at `index`.
    ///
    /// # Errors
    ///
    /// Errors if `index` is negative.
    pub fn get(&self, index: Index) -> Result<Number, Error> {
        if index < 0 {
            return Err(Error::NegativeIndex(index));
        }
        if let Some(cell) = self.dense.get(index as usize) {
            return Ok(cell.clone());
        }
        Ok(self.overflow.get(&index).cloned().unwrap_or_default())
    }

    /// Writes `value` at `index`. Writing [`Number::zero`] to an overflow
    /// cell erases its entry instead of storing a redundant zero.
    ///
    /// # Errors
    ///
    /// Errors if `index` is negative.
    pub fn set(&mut self, index: Index, value: Number) -> Result<(), Error> {
        if index < 0 {
            return Err(Error::NegativeIndex(index));
        }
        if let Some(cell) = self.dense.get_mut(index as usize) {
            *cell = value;
            return Ok(());
        }
        if value == Number::zero() {
            self.overflow.remove(&index);
        } else {
            self.overflow.insert(index, value);
        }
        Ok(())
    }

    /// Resets every cell to zero.
    pub fn clear(&mut self) {
        self.dense = Default::default();
        self.overflow.clear();
    }

    /// Zeroes the region `[start, start + length)` (or the mirrored range
    /// if `length` is negative, matching the original's signed-length
    /// convention).
    ///
    /// # Errors
    ///
    /// Errors if `start` is negative.
    pub fn clear_region(&mut self, start: Index, length: Index) -> Result<(), Error> {
        let (lo, hi) = Self::range(start, length);
        if lo < 0 {
            return Err(Error::NegativeIndex(lo));
        }
        for i in lo..hi {
            self.set(i, Number::zero())?;
        }
        Ok(())
    }

    /// Returns a copy of the window `[start, start + length)`, reindexed
    /// to begin at zero. Used to snapshot loop-counter regions.
    ///
    /// # Errors
    ///
    /// Errors if the window covers a negative index.
    pub fn fragment(&self, start: Index, length: Index) -> Result<Self, Error> {
        let (lo, hi) = Self::range(start, length);
        if lo < 0 {
            return Err(Error::NegativeIndex(lo));
        }
        let mut frag = Self::new();
        for i in lo..hi {
            frag.set(i - lo, self.get(i)?)?;
        }
        Ok(frag)
    }

    /// Lexicographic comparison over cells `0..length`: `true` iff `self`
    /// is strictly less than `other` on that window.
    ///
    /// If `check_non_negative` is set, any negative cell in `self` within
    /// the window forces the result to `false` regardless of ordering —
    /// used by region-mode loops to additionally require progress stay
    /// non-negative.
    #[must_use]
    pub fn is_less(&self, other: &Self, length: Index, check_non_negative: bool) -> bool {
        if length <= 0 {
            return false;
        }
        for i in 0..length {
            let a = self.get(i).unwrap_or_default();
            let b = other.get(i).unwrap_or_default();
            if check_non_negative && a.is_negative() {
                return false;
            }
            match a.cmp(&b) {
                std::cmp::Ordering::Less => return true,
                std::cmp::Ordering::Greater => return false,
                std::cmp::Ordering::Equal => continue,
            }
        }
        false
    }

    /// Approximate footprint used only to enforce the memory budget, never
    /// for correctness: the dense prefix plus the overflow map's size.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        DENSE_LEN + self.overflow.len()
    }

    /// Highest index with a non-default value, or `-1` if entirely zero.
    #[must_use]
    pub fn highest_set_index(&self) -> Index {
        let dense_high = self.dense.iter().enumerate().rev().find_map(|(i, v)| {
            (*v != Number::zero()).then_some(i as Index)
        });
        let overflow_high = self.overflow.keys().next_back().copied();
        dense_high.max(overflow_high).unwrap_or(-1)
    }

    fn range(start: Index, length: Index) -> (Index, Index) {
        if length > 0 {
            (start, start + length)
        } else {
            (start + length + 1, start + 1)
        }
    }
}

impl PartialEq for Memory {
    fn eq(&self, other: &Self) -> bool {
        if self.dense != other.dense {
            return false;
        }
        self.overflow == other.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_zero_erases_overflow_entry() {
        let mut mem = Memory::new();
        mem.set(100, Number::from(5_i64)).unwrap();
        assert_eq!(mem.overflow.len(), 1);
        mem.set(100, Number::zero()).unwrap();
        assert!(mem.overflow.is_empty());
        assert_eq!(mem.get(100).unwrap(), Number::zero());
    }

    #[test]
    fn negative_index_errors() {
        let mem = Memory::new();
        assert_eq!(mem.get(-1), Err(Error::NegativeIndex(-1)));
    }

    #[test]
    fn fragment_round_trips_window() {
        let mut mem = Memory::new();
        for i in 0..5 {
            mem.set(10 + i, Number::from(i)).unwrap();
        }
        let frag = mem.fragment(10, 5).unwrap();
        let mut restored = mem.clone();
        for i in 0..5 {
            restored.set(10 + i, frag.get(i).unwrap()).unwrap();
        }
        assert_eq!(mem, restored);
    }

    #[test]
    fn is_less_lexicographic() {
        let mut a = Memory::new();
        let mut b = Memory::new();
        a.set(0, Number::from(1_i64)).unwrap();
        b.set(0, Number::from(2_i64)).unwrap();
        assert!(a.is_less(&b, 1, false));
        assert!(!b.is_less(&a, 1, false));
    }

    #[test]
    fn is_less_rejects_negative_when_checked() {
        let mut a = Memory::new();
        a.set(0, Number::from(-1_i64)).unwrap();
        let b = Memory::new();
        assert!(!a.is_less(&b, 1, true));
    }
}
