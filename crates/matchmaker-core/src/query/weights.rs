//! Popularity damping used by every signal.

/// `log_base(2 + watchers)`: grows with popularity, flattens out, never zero.
pub fn damp(watchers: usize, base: f64) -> f64 {
    (2.0 + watchers as f64).log(base)
}

/// Weight of a co-occurrence hit: `log_base(shared + watchers)`, floored at zero.
pub fn cooccurrence_weight(shared: u32, watchers: usize, base: f64) -> f64 {
    (f64::from(shared) + watchers as f64).max(1.0).log(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damping_is_positive_and_increasing() {
        assert!(damp(0, 10.0) > 0.0);
        let mut previous = 0.0;
        for w in [0, 1, 10, 100, 10_000] {
            let d = damp(w, 10.0);
            assert!(d > previous);
            previous = d;
        }
        // Marginal weight shrinks.
        assert!(damp(1, 10.0) - damp(0, 10.0) > damp(101, 10.0) - damp(100, 10.0));
    }

    #[test]
    fn cooccurrence_weight_never_negative() {
        assert_eq!(cooccurrence_weight(0, 0, 10.0), 0.0);
        assert!((cooccurrence_weight(4, 6, 10.0) - 1.0).abs() < 1e-12);
    }
}
