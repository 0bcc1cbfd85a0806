/// argmax returns the index of the maximum value in the array x. If several elements share the
/// maximum value, the first one is returned. None is returned for an empty array.
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

/// lerp returns the linearly interpolated value between a and b for the fraction t. t is not
/// clamped.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

/// dist_2d returns the planar euclidean distance between the points (x1, y1) and (x2, y2).
pub fn dist_2d(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// clamp_unit clamps x into [0.0, 1.0]. NaN is mapped to 0.0.
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn argmax_prefers_first_of_equal_maxima() {
        assert_eq!(argmax(&[1.0, 3.0, 2.0, 3.0]), Some(1));
        assert_eq!(argmax(&[5]), Some(0));
        assert_eq!(argmax::<f64>(&[]), None);
    }

    #[test]
    fn lerp_hits_endpoints() {
        assert_relative_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_relative_eq!(lerp(2.0, 4.0, 1.0), 4.0);
        assert_relative_eq!(lerp(2.0, 4.0, 0.25), 2.5);
    }

    #[test]
    fn dist_2d_is_euclidean() {
        assert_relative_eq!(dist_2d(0.0, 0.0, 3.0, 4.0), 5.0);
    }

    #[test]
    fn clamp_unit_handles_nan_and_range() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_relative_eq!(clamp_unit(0.3), 0.3);
    }
}
