//! Image array helpers on [`nalgebra::DMatrix`] (rows = y, columns = x).
use nalgebra::DMatrix;

use crate::exarata_errors::ExarataError;

/// Boolean mask which is `true` inside a circle of `radius` pixels.
pub fn create_circular_mask(
    rows: usize,
    cols: usize,
    center_x: f64,
    center_y: f64,
    radius: f64,
) -> DMatrix<bool> {
    let radius_squared = radius * radius;
    DMatrix::from_fn(rows, cols, |y, x| {
        let dx = x as f64 - center_x;
        let dy = y as f64 - center_y;
        dx * dx + dy * dy <= radius_squared
    })
}

/// Percentile of a set of values, by linear interpolation between the closest ranks.
///
/// Non-finite values are ignored; `None` when nothing finite remains.
pub fn percentile(values: &[f64], percent: f64) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let rank = (percent.clamp(0.0, 100.0) / 100.0) * (finite.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(finite[lower] * (1.0 - weight) + finite[upper] * weight)
}

/// Median of the pixels where `mask` is `false`.
pub fn masked_median(data: &DMatrix<f64>, mask: &DMatrix<bool>) -> Option<f64> {
    let unmasked: Vec<f64> = data
        .iter()
        .zip(mask.iter())
        .filter_map(|(value, masked)| (!masked).then_some(*value))
        .collect();
    percentile(&unmasked, 50.0)
}

/// Clip an image between two percentiles, then scale it linearly onto `[minimum, maximum]`.
pub fn scale_image_array(
    data: &DMatrix<f64>,
    minimum: f64,
    maximum: f64,
    lower_percent: f64,
    upper_percent: f64,
) -> Result<DMatrix<f64>, ExarataError> {
    if lower_percent >= upper_percent {
        return Err(ExarataError::Input(format!(
            "The lower percentile cut {lower_percent} must be below the upper cut {upper_percent}"
        )));
    }
    let values = data.as_slice();
    let (Some(low), Some(high)) = (percentile(values, lower_percent), percentile(values, upper_percent)) else {
        return Err(ExarataError::Input("The image has no finite pixel to scale".into()));
    };
    let span = if high > low { high - low } else { 1.0 };
    Ok(data.map(|value| {
        let clipped = value.clamp(low, high);
        minimum + (clipped - low) / span * (maximum - minimum)
    }))
}

#[cfg(test)]
mod image_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_circular_mask() {
        let mask = create_circular_mask(5, 7, 3.0, 2.0, 1.0);
        assert!(mask[(2, 3)]);
        assert!(mask[(1, 3)]);
        assert!(mask[(2, 4)]);
        assert!(!mask[(1, 4)]);
        assert_eq!(mask.iter().filter(|m| **m).count(), 5);
    }

    #[test]
    fn test_percentile_and_median() {
        let values = [4.0, 1.0, f64::NAN, 3.0, 2.0];
        assert_relative_eq!(percentile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&values, 50.0).unwrap(), 2.5);
        assert_relative_eq!(percentile(&values, 100.0).unwrap(), 4.0);
        assert_eq!(percentile(&[f64::NAN], 50.0), None);

        let data = DMatrix::from_row_slice(2, 2, &[1.0, 100.0, 3.0, 5.0]);
        let mask = DMatrix::from_row_slice(2, 2, &[false, true, false, false]);
        assert_relative_eq!(masked_median(&data, &mask).unwrap(), 3.0);
    }

    #[test]
    fn test_scale_image_array() {
        let data = DMatrix::from_row_slice(1, 5, &[0.0, 1.0, 2.0, 3.0, 4.0]);
        let scaled = scale_image_array(&data, 0.0, 254.0, 25.0, 75.0).unwrap();
        assert_relative_eq!(scaled[(0, 0)], 0.0);
        assert_relative_eq!(scaled[(0, 2)], 127.0);
        assert_relative_eq!(scaled[(0, 4)], 254.0);
        assert!(scale_image_array(&data, 0.0, 1.0, 80.0, 20.0).is_err());
    }
}
