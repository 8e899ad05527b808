//! Array generators for creating predictable test data.

use ndarray::{ArrayD, Dimension, IxDyn};

/// Creates an array whose value is its flat (row-major) address.
///
/// # Example
///
/// ```
/// use test_utils::create_ramp;
///
/// let ramp = create_ramp(&[2, 3]);
/// assert_eq!(ramp[[1, 0].as_slice()], 3.0);
/// assert_eq!(ramp.len(), 6);
/// ```
pub fn create_ramp(shape: &[usize]) -> ArrayD<f64> {
    let len: usize = shape.iter().product();
    ArrayD::from_shape_vec(IxDyn(shape), (0..len).map(|v| v as f64).collect())
        .expect("ramp length matches shape")
}

/// Creates an array where each cell is `sum(index[k] * 10^(rank-1-k))`.
///
/// A `[2, 3]` grid holds `0, 1, 2, 10, 11, 12`, so every value spells its own
/// coordinates.
pub fn create_coordinate_grid(shape: &[usize]) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(shape), |index| {
        index
            .slice()
            .iter()
            .fold(0.0, |acc, &i| acc * 10.0 + i as f64)
    })
}

/// Creates a temperature-like field in Kelvin.
///
/// The values range from 250K to 310K along the flattened array.
pub fn create_temperature_field(shape: &[usize]) -> ArrayD<f64> {
    let len: usize = shape.iter().product();
    let step = if len > 1 { 60.0 / (len - 1) as f64 } else { 0.0 };
    ArrayD::from_shape_vec(IxDyn(shape), (0..len).map(|i| 250.0 + i as f64 * step).collect())
        .expect("field length matches shape")
}

/// Wraps values as decoded data, masking every `every`-th element.
///
/// `every == 0` masks nothing.
pub fn with_gaps(values: &ArrayD<f64>, every: usize) -> ArrayD<Option<f64>> {
    let mut k = 0;
    values.mapv(|v| {
        k += 1;
        if every > 0 && k % every == 0 {
            None
        } else {
            Some(v)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_grid() {
        let grid = create_coordinate_grid(&[2, 3]);
        assert_eq!(grid.iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_temperature_field_range() {
        let field = create_temperature_field(&[4, 4]);
        let min = field.iter().copied().fold(f64::INFINITY, f64::min);
        let max = field.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 250.0);
        assert!((max - 310.0).abs() < 1e-9);
    }

    #[test]
    fn test_with_gaps() {
        let gaps = with_gaps(&create_ramp(&[5]), 2);
        assert_eq!(gaps.iter().filter(|v| v.is_none()).count(), 2);
        assert_eq!(gaps[[0].as_slice()], Some(0.0));
        assert_eq!(gaps[[1].as_slice()], None);
    }
}
