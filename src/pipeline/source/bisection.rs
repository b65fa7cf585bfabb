/*
Copyright 2022 Jakub Lewandowski

This file is part of Surface Currents Merger (SCM).

Surface Currents Merger (SCM) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Surface Currents Merger (SCM) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Surface Currents Merger (SCM). If not, see https://www.gnu.org/licenses/.
*/

//! Module containg methods for conducting
//! binary search (bisection) of elements closest
//! to searched values in monotonic datasets.

use crate::errors::SearchError;

/// Core bisection function, an implementation of binary search
/// returning the index of the first item not before `x`
/// in the direction of the array ordering.
///
/// Works on ascending and descending arrays, which is needed
/// as some models store coordinates from north to south.
fn binary_search<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    let (first, last) = match (array.first(), array.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SearchError::EmptyArray),
    };

    if x < first && x < last || x > first && x > last {
        return Err(SearchError::OutOfBounds);
    }

    let ascending = first <= last;
    let mut lo = 0;
    let mut hi = array.len() - 1;

    while lo < hi {
        let mid = (lo + hi) / 2;

        let not_before = if ascending {
            array[mid] >= *x
        } else {
            array[mid] <= *x
        };

        if not_before {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    Ok(lo)
}

/// Finds the index of item closest to `x`.
///
/// Values beyond the array range resolve to the nearer end
/// and ties between two neighbours resolve to the earlier one.
pub fn find_nearest(array: &[f64], x: f64) -> Result<usize, SearchError> {
    let found_index = match binary_search(array, &x) {
        Ok(index) => index,
        Err(SearchError::OutOfBounds) => {
            let last = array.len() - 1;
            let to_first = (array[0] - x).abs();
            let to_last = (array[last] - x).abs();

            return Ok(if to_last < to_first { last } else { 0 });
        }
        Err(err) => return Err(err),
    };

    if found_index == 0 {
        return Ok(0);
    }

    let before = (array[found_index - 1] - x).abs();
    let after = (array[found_index] - x).abs();

    if before <= after {
        Ok(found_index - 1)
    } else {
        Ok(found_index)
    }
}

#[cfg(test)]
mod tests {
    use super::find_nearest;
    use crate::errors::SearchError;

    #[test]
    fn nearest_ascending() {
        let array = [0.0, 3.0, 6.0, 9.0, 12.0];

        assert_eq!(find_nearest(&array, 0.0).unwrap(), 0);
        assert_eq!(find_nearest(&array, 4.0).unwrap(), 1);
        assert_eq!(find_nearest(&array, 5.0).unwrap(), 2);
        assert_eq!(find_nearest(&array, 4.5).unwrap(), 1);
        assert_eq!(find_nearest(&array, 12.0).unwrap(), 4);
    }

    #[test]
    fn nearest_descending() {
        let array = [12.0, 9.0, 6.0, 3.0];

        assert_eq!(find_nearest(&array, 10.0).unwrap(), 1);
        assert_eq!(find_nearest(&array, 4.0).unwrap(), 3);
    }

    #[test]
    fn nearest_clamps_outside() {
        let array = [0.0, 1.0, 2.0];

        assert_eq!(find_nearest(&array, -5.0).unwrap(), 0);
        assert_eq!(find_nearest(&array, 50.0).unwrap(), 2);
    }

    #[test]
    fn nearest_empty() {
        assert!(matches!(
            find_nearest(&[], 1.0),
            Err(SearchError::EmptyArray)
        ));
    }
}
