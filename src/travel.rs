//! Percent ↔ pulse conversion for door travel.
//!
//! Cumulative open pulses approximate travel distance; a percentage is
//! converted against the configured full-open pulse count, always rounding
//! up so a requested opening is never undershot.

/// Convert a percentage (0-100) to a pulse count.
///
/// Any percentage above zero yields at least one pulse; zero yields none.
pub fn percent_to_pulses(percent: u32, full_open_pulses: u32) -> u32 {
    if percent == 0 {
        return 0;
    }
    let percent = percent.min(100);
    let pulses = (full_open_pulses * percent).div_ceil(100);
    pulses.max(1)
}

/// Convert a pulse count back to a percentage, capped at 100.
pub fn pulses_to_percent(pulses: u32, full_open_pulses: u32) -> u32 {
    if full_open_pulses == 0 {
        return 0;
    }
    ((pulses * 100) / full_open_pulses).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_against_full_open_count() {
        // 14-pulse door: 25% = 3.5 -> 4, 50% = 7, 75% = 10.5 -> 11
        assert_eq!(percent_to_pulses(25, 14), 4);
        assert_eq!(percent_to_pulses(50, 14), 7);
        assert_eq!(percent_to_pulses(75, 14), 11);
        assert_eq!(percent_to_pulses(100, 14), 14);
    }

    #[test]
    fn zero_percent_is_zero_pulses() {
        assert_eq!(percent_to_pulses(0, 14), 0);
    }

    #[test]
    fn nonzero_percent_is_at_least_one_pulse() {
        assert_eq!(percent_to_pulses(1, 14), 1);
        assert_eq!(percent_to_pulses(1, 4), 1);
    }

    #[test]
    fn over_hundred_percent_is_clamped() {
        assert_eq!(percent_to_pulses(150, 14), 14);
    }

    #[test]
    fn pulses_back_to_percent() {
        assert_eq!(pulses_to_percent(7, 14), 50);
        assert_eq!(pulses_to_percent(14, 14), 100);
        assert_eq!(pulses_to_percent(0, 14), 0);
        assert_eq!(pulses_to_percent(20, 14), 100);
    }
}
