// Bounded, deduplicated display series
use std::collections::VecDeque;

/// Number of points kept per series.
pub const CAPACITY: usize = 20;

/// Value equality that ignores the receipt timestamp.
pub trait SamePayload {
    fn same_payload(&self, other: &Self) -> bool;
}

/// Append-only window of the most recent admitted points, oldest first.
#[derive(Debug, Clone)]
pub struct BoundedSeries<T> {
    points: VecDeque<T>,
    capacity: usize,
}

impl<T: SamePayload> BoundedSeries<T> {
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    /// Capacity is clamped to at least one point.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Admit `point` unless its payload repeats the last admitted entry.
    /// Returns whether the point was appended.
    pub fn admit(&mut self, point: T) -> bool {
        if let Some(last) = self.points.back() {
            if last.same_payload(&point) {
                return false;
            }
        }

        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
        true
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.points.iter()
    }
}

impl<T: SamePayload + Clone> BoundedSeries<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.points.iter().cloned().collect()
    }
}

impl<T: SamePayload> Default for BoundedSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}
