use std::collections::VecDeque;

/// RingBuffer keeps the most recent `capacity` values, e.g. to smooth frame durations.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    values: VecDeque<T>,
}

impl<T: Copy + Into<f64>> RingBuffer<T> {
    pub fn new(capacity: usize) -> RingBuffer<T> {
        RingBuffer {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// push appends a value and drops the oldest one if the buffer is full.
    pub fn push(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// get_avg returns the mean of the stored values or None if nothing was pushed yet.
    pub fn get_avg(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().map(|&v| v.into()).sum();
        Some(sum / self.values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::RingBuffer;

    #[test]
    fn keeps_only_latest_values() {
        let mut buffer = RingBuffer::new(3);
        assert_eq!(buffer.get_avg(), None);

        for value in [10u32, 20, 30, 40] {
            buffer.push(value);
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get_avg(), Some(30.0));
    }
}
