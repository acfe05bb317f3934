//! # Sky-plane propagation
//!
//! Short-term prediction of where a target will be, from its recent
//! positions alone. Right ascension and declination are fitted independently
//! by a polynomial in time, linear or quadratic, then extrapolated.
pub mod polynomial;
pub mod solution;

pub use polynomial::PolynomialPropagator;
pub use solution::PropagativeSolution;

use crate::constants::Degree;

/// Wrap a right ascension into [0, 360).
pub fn wrap_ra(ra: Degree) -> Degree {
    ra.rem_euclid(360.0)
}

/// Fold a declination back into [-90, 90] as if it went over a pole.
pub fn wrap_dec(dec: Degree) -> Degree {
    ((dec - 90.0).rem_euclid(360.0) - 180.0).abs() - 90.0
}

/// Remove the 360 degree jumps of a right ascension sequence.
pub fn unwrap_ra(ra: &[Degree]) -> Vec<Degree> {
    let mut unwrapped: Vec<Degree> = Vec::with_capacity(ra.len());
    for &value in ra {
        let next = match unwrapped.last() {
            Some(&previous) => value + 360.0 * ((previous - value) / 360.0).round(),
            None => value,
        };
        unwrapped.push(next);
    }
    unwrapped
}

#[cfg(test)]
mod propagate_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrapping() {
        assert_eq!(wrap_ra(-10.0), 350.0);
        assert_eq!(wrap_ra(370.0), 10.0);
        assert_eq!(wrap_dec(45.0), 45.0);
        assert_eq!(wrap_dec(95.0), 85.0);
        assert_eq!(wrap_dec(-95.0), -85.0);
    }

    #[test]
    fn test_unwrap_ra() {
        let unwrapped = unwrap_ra(&[358.0, 359.5, 0.5, 2.0]);
        assert_relative_eq!(unwrapped[2], 360.5);
        assert_relative_eq!(unwrapped[3], 362.0);
        assert_eq!(unwrap_ra(&[10.0, 5.0]), vec![10.0, 5.0]);
    }
}
