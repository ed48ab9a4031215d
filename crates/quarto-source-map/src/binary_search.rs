//! Greatest-lower-bound search over sorted slices

use std::cmp::Ordering;

/// Find the index of the greatest element that is less than or equal to `value`.
///
/// `items` must be sorted in ascending order with respect to `compare`.
/// Returns `None` when `value` is smaller than every element (including
/// when `items` is empty).
///
/// # Example
///
/// ```
/// use quarto_source_map::glb;
///
/// let starts = [0, 4, 9];
/// assert_eq!(glb(&starts, &5), Some(1));
/// assert_eq!(glb(&starts, &9), Some(2));
/// ```
pub fn glb<T: Ord>(items: &[T], value: &T) -> Option<usize> {
    glb_by(items, |item| item.cmp(value))
}

/// Like [`glb`], with a comparator that orders each element against the target.
///
/// `compare(item)` returns how `item` orders relative to the value being
/// searched for.
pub fn glb_by<T>(items: &[T], mut compare: impl FnMut(&T) -> Ordering) -> Option<usize> {
    let past = items.partition_point(|item| compare(item) != Ordering::Greater);
    past.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glb_empty() {
        let empty: [usize; 0] = [];
        assert_eq!(glb(&empty, &3), None);
    }

    #[test]
    fn test_glb_below_all() {
        assert_eq!(glb(&[5, 10, 15], &1), None);
    }

    #[test]
    fn test_glb_exact_and_between() {
        let items = [0, 5, 10, 15];
        assert_eq!(glb(&items, &0), Some(0));
        assert_eq!(glb(&items, &7), Some(1));
        assert_eq!(glb(&items, &10), Some(2));
        assert_eq!(glb(&items, &100), Some(3));
    }

    #[test]
    fn test_glb_by_key() {
        let pieces = [(0usize, "a"), (3, "b"), (8, "c")];
        assert_eq!(glb_by(&pieces, |(start, _)| start.cmp(&4)), Some(1));
        assert_eq!(glb_by(&pieces, |(start, _)| start.cmp(&8)), Some(2));
    }
}
