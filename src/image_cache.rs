use crate::position::TimePoint;
use std::collections::{HashMap, VecDeque};

/// Images (or anything else) per time point, kept within a byte budget. When the
/// budget is exceeded, the least recently used entries are dropped first.
#[derive(Clone, Debug)]
pub struct ImageCache<T> {
    max_bytes: usize,
    used_bytes: usize,
    entries: HashMap<TimePoint, (T, usize)>,
    /// Least recently used first.
    order: VecDeque<TimePoint>,
}

impl<T> ImageCache<T> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, time_point: TimePoint) {
        if let Some(index) = self.order.iter().position(|tp| *tp == time_point) {
            self.order.remove(index);
        }
        self.order.push_back(time_point);
    }

    /// The cached value, which becomes the most recently used one.
    pub fn get(&mut self, time_point: TimePoint) -> Option<&T> {
        if !self.entries.contains_key(&time_point) {
            return None;
        }
        self.touch(time_point);
        self.entries.get(&time_point).map(|(value, _)| value)
    }

    pub fn contains(&self, time_point: TimePoint) -> bool {
        self.entries.contains_key(&time_point)
    }

    /// Stores the value and evicts old entries until the cache fits its budget again.
    /// A value larger than the whole budget is not stored. Returns whether it was stored.
    pub fn insert(&mut self, time_point: TimePoint, value: T, size_bytes: usize) -> bool {
        self.remove(time_point);
        if size_bytes > self.max_bytes {
            tracing::debug!(
                %time_point,
                size_bytes,
                max_bytes = self.max_bytes,
                "Image too large to cache"
            );
            return false;
        }
        while self.used_bytes + size_bytes > self.max_bytes {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some((_, size)) = self.entries.remove(&oldest) {
                self.used_bytes -= size;
            }
        }
        self.entries.insert(time_point, (value, size_bytes));
        self.order.push_back(time_point);
        self.used_bytes += size_bytes;
        true
    }

    pub fn remove(&mut self, time_point: TimePoint) -> Option<T> {
        let (value, size) = self.entries.remove(&time_point)?;
        self.used_bytes -= size;
        self.order.retain(|tp| *tp != time_point);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.used_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}
