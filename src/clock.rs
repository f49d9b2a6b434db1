/*!
Sequencer time. One tick is 100 microseconds. Times are signed 31-bit, which
allows roughly 24 days between epoch resets. The epoch itself is an
`Instant`, so elapsed time is monotonic across wall-clock adjustments.
!*/

use std::time::{Duration, Instant};

/// Sequencer time in 100 microsecond units.
pub type Ticks = i32;

const TICK_MICROS: u64 = 100;

/// Ticks elapsed since `epoch`, saturating at `i32::MAX`.
pub(crate) fn elapsed_ticks(epoch: Instant) -> Ticks {
    let ticks = epoch.elapsed().as_micros() / u128::from(TICK_MICROS);
    ticks.min(i32::MAX as u128) as Ticks
}

/// The wall-clock duration of `ticks`. Zero for past-due (negative) values.
pub(crate) fn ticks_duration(ticks: Ticks) -> Duration {
    if ticks <= 0 {
        Duration::from_micros(0)
    } else {
        Duration::from_micros(ticks as u64 * TICK_MICROS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_conversions() {
        assert_eq!(Duration::from_micros(0), ticks_duration(-5));
        assert_eq!(Duration::from_micros(0), ticks_duration(0));
        assert_eq!(Duration::from_millis(1), ticks_duration(10));
        assert_eq!(Duration::from_secs(1), ticks_duration(10_000));
    }

    #[test]
    fn elapsed_counts_up() {
        let epoch = Instant::now();
        let first = elapsed_ticks(epoch);
        std::thread::sleep(Duration::from_millis(5));
        let second = elapsed_ticks(epoch);
        assert!(first >= 0);
        assert!(second >= first + 10, "{} then {}", first, second);
    }
}
