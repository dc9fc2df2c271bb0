use std::error::Error;
use std::fmt;

/// InputValueError is used if some simulation option or parameter does not fulfill the posed
/// requirements, e.g., a time step size outside of the supported range.
#[derive(Debug, Clone)]
pub struct InputValueError {
    pub msg: String,
}

impl InputValueError {
    pub fn new(msg: impl Into<String>) -> InputValueError {
        InputValueError { msg: msg.into() }
    }
}

impl fmt::Display for InputValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid input value: {}", self.msg)
    }
}

impl Error for InputValueError {}

/// argmin returns the index of the minimum value in the array x. Ties resolve to the first
/// occurrence. Returns None for an empty array.
pub fn argmin<T: std::cmp::PartialOrd + std::marker::Copy>(x: &[T]) -> Option<usize> {
    let mut iter = x.iter().enumerate();
    let (mut idx_min, &first) = iter.next()?;
    let mut val_min = first;

    for (i, &val) in iter {
        if val < val_min {
            val_min = val;
            idx_min = i;
        }
    }

    Some(idx_min)
}

/// argmax returns the index of the maximum value in the array x. Ties resolve to the first
/// occurrence. Returns None for an empty array.
pub fn argmax<T: std::cmp::PartialOrd + std::marker::Copy>(x: &[T]) -> Option<usize> {
    let mut iter = x.iter().enumerate();
    let (mut idx_max, &first) = iter.next()?;
    let mut val_max = first;

    for (i, &val) in iter {
        if val > val_max {
            val_max = val;
            idx_max = i;
        }
    }

    Some(idx_max)
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. The sort is stable, i.e. equal values
/// keep their original order.
pub fn argsort<T: std::cmp::PartialOrd>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| {
            x[a].partial_cmp(&x[b]).unwrap_or(std::cmp::Ordering::Equal)
        }),
        SortOrder::Descending => indices.sort_by(|&a, &b| {
            x[b].partial_cmp(&x[a]).unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmin_prefers_first_of_equal_values() {
        assert_eq!(argmin(&[10, 5, 5, 7]), Some(1));
        assert_eq!(argmin(&[3.0, 3.0]), Some(0));
        assert_eq!(argmin::<u32>(&[]), None);
    }

    #[test]
    fn argmax_prefers_first_of_equal_values() {
        assert_eq!(argmax(&[1, 9, 9, 2]), Some(1));
        assert_eq!(argmax::<f64>(&[]), None);
    }

    #[test]
    fn argsort_is_stable() {
        let scores = [4, 1, 4, 0];
        assert_eq!(argsort(&scores, SortOrder::Ascending), vec![3, 1, 0, 2]);
        assert_eq!(argsort(&scores, SortOrder::Descending), vec![0, 2, 1, 3]);
    }

    #[test]
    fn input_value_error_mentions_message() {
        let err = InputValueError::new("timestep size must be in [0.001, 1.0]");
        assert!(err.to_string().contains("timestep size"));
    }
}
