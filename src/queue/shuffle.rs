// Shuffle sequencing
//
// A playlist load fixes a random permutation of the track indices (the
// play order) and an initially empty history of visited order positions.
// Forward navigation consumes the permutation left to right, skipping
// positions already played; backward navigation walks the history. The
// two structures live and die together.

use rand::Rng;

/// Non-repeating shuffle order with bounded back-navigation.
///
/// `advance` hands out each position of the shuffled order exactly once
/// before reporting exhaustion; `retreat` steps back through what was
/// actually played. Values returned by both are positions *within the
/// order*; map them to track indices with [`Sequencer::track_index`].
#[derive(Debug)]
pub struct Sequencer {
    /// Permutation of `0..track_count`, fixed at construction
    order: Vec<usize>,
    /// Order positions visited by forward navigation, oldest first
    history: Vec<usize>,
}

impl Sequencer {
    /// Shuffle `track_count` tracks into a fresh play order with an empty
    /// history. A count of zero yields a sequencer with nothing to play.
    pub fn new(track_count: usize) -> Self {
        Self::with_rng(track_count, &mut rand::thread_rng())
    }

    /// Like [`Sequencer::new`] but with a caller-supplied RNG, so tests
    /// can pin the permutation.
    pub fn with_rng<R: Rng>(track_count: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..track_count).collect();

        // Fisher-Yates, walking down from the top
        for i in (1..order.len()).rev() {
            let j = rng.gen_range(0..=i);
            order.swap(i, j);
        }

        Self {
            order,
            history: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The shuffled permutation, positions left to right
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Map an order position to the track index it refers to
    pub fn track_index(&self, position: usize) -> Option<usize> {
        self.order.get(position).copied()
    }

    /// The position `advance` would select, without recording anything.
    ///
    /// The session uses this to resolve a track before committing the
    /// navigation, so a superseded request leaves no trace.
    pub fn peek_advance(&self) -> Option<usize> {
        (0..self.order.len()).find(|pos| !self.history.contains(pos))
    }

    /// The position `retreat` would return, without popping the history
    pub fn peek_retreat(&self) -> Option<usize> {
        if self.history.len() <= 1 {
            return None;
        }
        self.history.get(self.history.len() - 2).copied()
    }

    /// Select the next unplayed position and record it as played.
    ///
    /// The selection is the first position of the order not yet in the
    /// history (a stable scan, not a fresh random draw), so a full pass
    /// visits the permutation exactly in order. Returns `None` when every
    /// position has been played; the caller stops playback rather than
    /// reshuffling.
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.peek_advance()?;
        self.history.push(next);
        Some(next)
    }

    /// Step back to the previously played position.
    ///
    /// Pops the most recent history entry and returns the new top without
    /// re-recording it. With one or no entries there is nothing earlier to
    /// return to and the history is left untouched. Because the popped
    /// entry is discarded, a later `advance` resumes the unplayed-position
    /// scan from the start of the order rather than from the revisited
    /// point: the popped position becomes eligible to play again.
    pub fn retreat(&mut self) -> Option<usize> {
        if self.history.len() <= 1 {
            return None;
        }
        self.history.pop();
        self.history.last().copied()
    }
}
