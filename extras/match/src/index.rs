//! Maps reduced-sequence fingerprints to catalog IDs, and extends a
//! freshly evaluated program into one producing a matched ID's
//! sequence.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use seqmine_arch::Sequence;
use seqmine_core::program::Program;

use crate::reduce::Reducer;

/// A catalog identifier. The core engine treats IDs opaquely; callers
/// (a catalog-synchronizing miner driver) own their meaning.
pub type Id = u64;

/// A successful [`match`](MatcherIndex::match_program), extending a
/// candidate program into one computed to produce a catalog entry's
/// sequence.
#[derive(Debug)]
pub struct Candidate {
    pub id: Id,
    pub program: Program,
}

/// An index from a reducer's canonical sequence form to the catalog
/// IDs whose own sequence reduces to it, plus a per-ID cache of the
/// reducer data recorded at insertion.
pub struct MatcherIndex<R: Reducer> {
    reducer: R,
    by_reduced: IndexMap<Sequence, HashSet<Id>>,
    data: HashMap<Id, R::Data>,
    backoff: HashSet<Id>,
}

impl<R: Reducer> MatcherIndex<R> {
    /// Constructs an empty index around `reducer`.
    pub fn new(reducer: R) -> Self {
        Self { reducer, by_reduced: IndexMap::new(), data: HashMap::new(), backoff: HashSet::new() }
    }

    /// Records `seq` as the sequence belonging to catalog ID `id`.
    pub fn insert(&mut self, seq: &Sequence, id: Id) {
        let (reduced, data) = self.reducer.reduce(seq);
        self.by_reduced.entry(reduced).or_default().insert(id);
        self.data.insert(id, data);
    }

    /// Removes `id` from the index, forgetting its reducer data.
    pub fn remove(&mut self, seq: &Sequence, id: Id) {
        let (reduced, _) = self.reducer.reduce(seq);
        if let Some(ids) = self.by_reduced.get_mut(&reduced) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_reduced.shift_remove(&reduced);
            }
        }
        self.data.remove(&id);
        self.backoff.remove(&id);
    }

    /// Reduces `seq` (the sequence `program` is known to produce), and
    /// for every catalog ID whose own sequence reduces to the same
    /// canonical form, attempts to extend `program` into one producing
    /// that ID's sequence. IDs marked via [`skip`](MatcherIndex::skip)
    /// are omitted.
    pub fn match_program(&self, program: &Program, seq: &Sequence) -> Vec<Candidate> {
        let (reduced, query) = self.reducer.reduce(seq);
        let Some(ids) = self.by_reduced.get(&reduced) else {
            return Vec::new();
        };
        ids.iter()
            .filter(|id| !self.backoff.contains(*id))
            .filter_map(|&id| {
                let original = self.data.get(&id)?;
                let extended = self.reducer.extend(program, original, &query)?;
                Some(Candidate { id, program: extended })
            })
            .collect()
    }

    /// Marks `id` to be skipped by subsequent [`match_program`] calls
    /// until [`unskip`](MatcherIndex::unskip) is called. Used to avoid
    /// repeatedly retrying an ID that was just matched and rejected.
    pub fn skip(&mut self, id: Id) {
        self.backoff.insert(id);
    }

    /// Clears a prior [`skip`](MatcherIndex::skip) for `id`.
    pub fn unskip(&mut self, id: Id) {
        self.backoff.remove(&id);
    }

    /// The number of distinct canonical forms currently indexed.
    pub fn len(&self) -> usize {
        self.by_reduced.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.by_reduced.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::Linear1;
    use seqmine_arch::Number;

    fn seq(values: &[i64]) -> Sequence {
        values.iter().map(|&v| Number::from(v)).collect()
    }

    #[test]
    fn insert_and_match_finds_linearly_related_sequence() {
        let mut index = MatcherIndex::new(Linear1);
        index.insert(&seq(&[10, 14, 18, 22]), 1);

        let program = Program::new();
        let candidates = index.match_program(&program, &seq(&[0, 4, 8, 12]));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, 1);
    }

    #[test]
    fn remove_drops_future_matches() {
        let mut index = MatcherIndex::new(Linear1);
        index.insert(&seq(&[10, 14, 18, 22]), 1);
        index.remove(&seq(&[10, 14, 18, 22]), 1);

        let program = Program::new();
        assert!(index.match_program(&program, &seq(&[0, 4, 8, 12])).is_empty());
    }

    #[test]
    fn skip_suppresses_a_candidate() {
        let mut index = MatcherIndex::new(Linear1);
        index.insert(&seq(&[10, 14, 18, 22]), 1);
        index.skip(1);

        let program = Program::new();
        assert!(index.match_program(&program, &seq(&[0, 4, 8, 12])).is_empty());

        index.unskip(1);
        assert_eq!(index.match_program(&program, &seq(&[0, 4, 8, 12])).len(), 1);
    }
}
