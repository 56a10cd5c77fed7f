//! Sample index store: the flat record collection and its shuffled
//! traversal order.
//!
//! The store visits every record exactly once per epoch. When the cursor
//! reaches the end of the order it reshuffles and restarts; repeats across
//! the epoch boundary are allowed. All mutation happens inside
//! [`SampleStore::next_index`] so the reshuffle-on-exhaustion invariant
//! cannot be bypassed by callers.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::CropgenError;
use crate::geom::Rect;

/// One sampleable window: the index of its source image and the window
/// rectangle in that image's full-resolution coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub image_index: usize,
    pub window: Rect,
}

/// Record collection plus shuffled traversal state.
///
/// The store owns its random generator; one generator is reused across
/// reshuffles for the lifetime of the store.
#[derive(Debug)]
pub struct SampleStore {
    records: Vec<SampleRecord>,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
}

impl SampleStore {
    /// Builds a store from the records collected at construction time.
    ///
    /// The traversal order starts as the identity permutation, is shuffled
    /// once, and the cursor rests at the start of the first epoch. With
    /// `seed` the traversal is deterministic; otherwise the generator is
    /// seeded from OS entropy.
    pub fn new(records: Vec<SampleRecord>, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.shuffle(&mut rng);
        Self {
            records,
            order,
            cursor: 0,
            rng,
        }
    }

    /// Reassembles a store from persisted parts, validating the traversal
    /// invariants. The generator is always reseeded from entropy; random
    /// state is process-local and never part of a snapshot.
    pub(crate) fn from_parts(
        records: Vec<SampleRecord>,
        order: Vec<usize>,
        cursor: usize,
    ) -> Result<Self, CropgenError> {
        let n = records.len();
        if order.len() != n {
            return Err(CropgenError::payload(format!(
                "traversal order has {} entries for {} records",
                order.len(),
                n
            )));
        }
        if cursor > n {
            return Err(CropgenError::payload(format!(
                "cursor {cursor} exceeds record count {n}"
            )));
        }
        let mut seen = vec![false; n];
        for &idx in &order {
            if idx >= n || seen[idx] {
                return Err(CropgenError::payload(
                    "traversal order is not a permutation of the records",
                ));
            }
            seen[idx] = true;
        }
        Ok(Self {
            records,
            order,
            cursor,
            rng: StdRng::from_rng(&mut rand::rng()),
        })
    }

    /// Returns the number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the store holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record at `index`.
    #[inline]
    pub fn record(&self, index: usize) -> &SampleRecord {
        &self.records[index]
    }

    /// Returns all records in construction order.
    #[inline]
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    /// Returns the current traversal order.
    #[inline]
    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    /// Returns the traversal cursor, in `[0, len]`.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Yields the next sample index, reshuffling first when the current
    /// epoch is exhausted.
    ///
    /// Fails with [`CropgenError::EmptyDataset`] on an empty store without
    /// touching traversal state.
    pub fn next_index(&mut self) -> Result<usize, CropgenError> {
        if self.records.is_empty() {
            return Err(CropgenError::EmptyDataset);
        }
        if self.cursor == self.order.len() {
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
        }
        let index = self.order[self.cursor];
        self.cursor += 1;
        Ok(index)
    }

    /// Non-advancing view of the next sample index.
    ///
    /// Returns `None` on an empty store and at an epoch boundary, where the
    /// next index is undetermined until `next_index` reshuffles.
    pub fn peek_index(&self) -> Option<usize> {
        self.order.get(self.cursor).copied()
    }
}
