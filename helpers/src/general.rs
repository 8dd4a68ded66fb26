use std::f64::consts::PI;

/// argmax returns the index of the maximum value in the array x.
pub fn argmax<T: std::cmp::PartialOrd + std::marker::Copy>(x: &[T]) -> usize {
    let mut idx_max = 0;
    let mut val_max = x[0];

    for (i, &val) in x.iter().enumerate().skip(1) {
        if val > val_max {
            val_max = val;
            idx_max = i;
        }
    }

    idx_max
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array.
pub fn argsort<T: std::cmp::PartialOrd>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap()),
        SortOrder::Descending => indices.sort_by(|&a, &b| x[b].partial_cmp(&x[a]).unwrap()),
    }
    indices
}

/// wrap_to_pi wraps an angle in radians into ]-pi, pi]. Headings must be compared through this
/// to avoid the 2 pi discontinuity.
pub fn wrap_to_pi(angle: f64) -> f64 {
    let mut wrapped = angle % (2.0 * PI);

    if wrapped > PI {
        wrapped -= 2.0 * PI;
    } else if wrapped <= -PI {
        wrapped += 2.0 * PI;
    }

    wrapped
}

/// dist_2d returns the Euclidean distance between two points in the world plane.
pub fn dist_2d(x_1: f64, y_1: f64, x_2: f64, y_2: f64) -> f64 {
    ((x_2 - x_1).powi(2) + (y_2 - y_1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_returns_first_maximum() {
        assert_eq!(argmax(&[1.0, 5.0, 3.0, 5.0]), 1);
        assert_eq!(argmax(&[7]), 0);
    }

    #[test]
    fn argsort_orders_indices() {
        let values = [3.0, 1.0, 2.0];

        assert_eq!(argsort(&values, SortOrder::Ascending), vec![1, 2, 0]);
        assert_eq!(argsort(&values, SortOrder::Descending), vec![0, 2, 1]);
    }

    #[test]
    fn wrap_to_pi_stays_within_interval() {
        assert!((wrap_to_pi(3.0 * PI) - PI).abs() < 1e-12);
        assert!((wrap_to_pi(-3.0 * PI) - PI).abs() < 1e-12);
        assert!((wrap_to_pi(0.5) - 0.5).abs() < 1e-12);
        assert!(wrap_to_pi(2.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn dist_2d_matches_pythagoras() {
        assert!((dist_2d(0.0, 0.0, 3.0, 4.0) - 5.0).abs() < 1e-12);
    }
}
