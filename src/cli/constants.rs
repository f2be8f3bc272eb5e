//! Identity constants and the notification-level display infrastructure
//! shared by the command-line front ends.

use std::sync::atomic::{AtomicI32, Ordering};

pub const GENERATOR_NAME: &str = "qcdbgen";
pub const STRESS_NAME: &str = "qcdbstress";

/// Crate version reported by `--version`.
pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

// Notification level: 0 = silent, 1 = errors only, 2 = results + warnings,
// 3 = info, 4+ = verbose.  A process-wide atomic, adjusted by -v / -q.
pub static DISPLAY_LEVEL: AtomicI32 = AtomicI32::new(2);

/// Returns the current notification level.
#[inline]
pub fn display_level() -> i32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

/// Sets the notification level.
#[inline]
pub fn set_display_level(level: i32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Print to stderr unconditionally.
#[macro_export]
macro_rules! display {
    ($($arg:tt)*) => { eprint!($($arg)*) };
}

/// Print to stderr when the notification level is at or above `level`.
#[macro_export]
macro_rules! displaylevel {
    ($level:expr, $($arg:tt)*) => {
        if $crate::cli::constants::display_level() >= $level {
            eprint!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_round_trip() {
        let before = display_level();
        set_display_level(4);
        assert_eq!(display_level(), 4);
        set_display_level(before);
    }
}
