//! Fixed-size batching.
//!
//! [`Batcher`] takes ownership of a sequence and drains it front to back in
//! batches of at most `batch_size`. The bound is capped at
//! [`MAX_BATCH_SIZE`], the largest bulk write the persistence sink accepts.

use std::collections::VecDeque;

/// Largest batch any sink accepts in one call.
pub const MAX_BATCH_SIZE: usize = 25;

/// Draining batch iterator over an owned queue.
#[derive(Debug)]
pub struct Batcher<T> {
    queue: VecDeque<T>,
    batch_size: usize,
}

impl<T> Batcher<T> {
    /// Build a batcher. `batch_size` is clamped to `1..=MAX_BATCH_SIZE`.
    pub fn new(items: impl IntoIterator<Item = T>, batch_size: usize) -> Self {
        Self {
            queue: items.into_iter().collect(),
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

}

impl<T> Iterator for Batcher<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        if self.queue.is_empty() {
            return None;
        }
        let take = self.queue.len().min(self.batch_size);
        Some(self.queue.drain(..take).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.queue.len().div_ceil(self.batch_size);
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for Batcher<T> {}
