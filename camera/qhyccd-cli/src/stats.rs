/// Mean and population standard deviation of `samples`.
pub fn mean_std(samples: &[u16]) -> (f64, f64) {
    if samples.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|s| *s as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|s| {
            let d = *s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_values() {
        let (mean, std) = mean_std(&[2, 4, 4, 4, 5, 5, 7, 9]);
        approx::assert_relative_eq!(mean, 5.0);
        approx::assert_relative_eq!(std, 2.0);
    }

    #[test]
    fn constant_frame() {
        let (mean, std) = mean_std(&[100; 16]);
        approx::assert_relative_eq!(mean, 100.0);
        approx::assert_relative_eq!(std, 0.0);
    }

    #[test]
    fn empty() {
        let (mean, std) = mean_std(&[]);
        assert!(mean.is_nan());
        assert!(std.is_nan());
    }
}
