//! Arithmetic rules shared by the entities.
//!
//! Everything here is pure so the entity transitions built on top of it can be
//! tested without a database.

pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Folds `new` into an average over `old_count` previous values.
///
/// Without a previous average the new value becomes the average.
pub fn running_average(old: Option<f64>, old_count: i32, new: f64) -> f64 {
    match old {
        None => new,
        Some(old) => {
            let count = f64::from(old_count.max(0));
            (old * count + new) / (count + 1.0)
        }
    }
}

pub fn percentage(score: f64, max: f64) -> f64 {
    if max > 0.0 { score / max * 100.0 } else { 0.0 }
}

/// No threshold means every attempt passes.
pub fn is_passing(percentage: f64, passing_score: Option<f64>) -> bool {
    match passing_score {
        Some(threshold) => percentage >= threshold,
        None => true,
    }
}

pub fn completion_rate(completed: i32, enrolled: i32) -> f64 {
    percentage(f64::from(completed), f64::from(enrolled))
}

pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_percentage(-5.0), 0.0);
        assert_eq!(clamp_percentage(42.5), 42.5);
        assert_eq!(clamp_percentage(180.0), 100.0);
        assert_eq!(clamp_percentage(f64::NAN), 0.0);
    }

    #[test]
    fn running_average_matches_mean() {
        let ratings = [5.0, 3.0, 4.0, 1.0, 2.0];
        let mut current = None;
        for (count, rating) in ratings.iter().enumerate() {
            current = Some(running_average(current, count as i32, *rating));
        }

        let mean = average(&ratings);
        assert!((current.unwrap() - mean).abs() < 1e-9);
    }

    #[test]
    fn first_rating_becomes_average() {
        assert_eq!(running_average(None, 0, 4.0), 4.0);
        assert_eq!(running_average(Some(4.0), 1, 2.0), 3.0);
    }

    #[test]
    fn percentage_of_zero_max_is_zero() {
        assert_eq!(percentage(3.0, 0.0), 0.0);
        assert_eq!(percentage(3.0, 4.0), 75.0);
    }

    #[test]
    fn passing_threshold() {
        assert!(is_passing(70.0, Some(70.0)));
        assert!(!is_passing(69.9, Some(70.0)));
        assert!(is_passing(0.0, None));
    }

    #[test]
    fn completion_rate_without_enrollments() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 4), 25.0);
    }
}
