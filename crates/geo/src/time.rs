/// Time primitives
///
/// All debounce, cooldown and watchdog logic takes a `Time` argument instead
/// of reading a clock, so the cores stay deterministic under test.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Time = Time(0.0);

    /// Seconds elapsed since `earlier`; never negative.
    pub fn since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    pub fn plus(self, seconds: f64) -> Time {
        Time(self.0 + seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn since_is_clamped_at_zero() {
        assert_eq!(Time(1.0).since(Time(3.0)), 0.0);
        assert_eq!(Time(3.0).since(Time(1.0)), 2.0);
    }

    #[test]
    fn plus_advances() {
        assert_eq!(Time(1.0).plus(0.45), Time(1.45));
    }
}
