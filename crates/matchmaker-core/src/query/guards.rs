//! Shared limits for candidate selection and fallbacks.

/// A single author may contribute at most this many recommendations.
pub const MAX_PER_AUTHOR: usize = 3;
/// A single project name may contribute at most this many recommendations.
pub const MAX_PER_NAME: usize = 5;
/// Watchers within this distance of a user's id count as "nearby".
pub const LOCALITY_RADIUS: u32 = 250;
/// Above this many candidates, only statistically outstanding scores are kept.
pub const SPREAD_PRUNE_MIN_CANDIDATES: usize = 3000;
pub const SPREAD_PRUNE_SIGMAS: f64 = 2.5;
/// Upper bound for a caller-supplied worker count.
pub const MAX_WORKERS: usize = 256;

pub fn clamp_int(value: usize, minimum: usize, maximum: usize) -> usize {
    value.max(minimum).min(maximum)
}

pub fn clamp_workers(value: usize) -> usize {
    clamp_int(value, 1, MAX_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_bounded() {
        assert_eq!(clamp_workers(0), 1);
        assert_eq!(clamp_workers(8), 8);
        assert_eq!(clamp_workers(10_000), MAX_WORKERS);
    }
}
