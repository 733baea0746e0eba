use std::{
    cmp::{
        Ordering,
        Reverse,
    },
    collections::BinaryHeap,
    path::PathBuf,
};

/// Fixed capacity selection of the heaviest items of a stream. The lightest
/// item is evicted as soon as the capacity is exceeded.
pub struct TopN<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<T>>>,
}

struct Ranked<T> {
    weight: u64,
    path: PathBuf,
    item: T,
}

impl<T> Ranked<T> {
    /* equal weights: the lexicographically larger path ranks lower */
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.weight
            .cmp(&other.weight)
            .then_with(|| other.path.cmp(&self.path))
    }
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.key_cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_cmp(other)
    }
}

impl<T> TopN<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(4096)),
        }
    }

    pub fn push(&mut self, weight: u64, path: PathBuf, item: T) {
        if self.capacity == 0 {
            return;
        }

        self.heap.push(Reverse(Ranked { weight, path, item }));
        while self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Heaviest first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        /* ascending order of Reverse is descending order of the weight */
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| ranked.item)
            .collect()
    }
}
