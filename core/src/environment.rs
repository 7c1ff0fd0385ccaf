//! Injected dependencies: time and booking-reference generation.
//!
//! Production code uses [`SystemClock`] and [`RandomReferenceGenerator`];
//! tests swap in deterministic implementations from `coachline-testing`.

use crate::types::BookingReference;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Clock trait for time operations
///
/// Abstracts over time so tests can pin "now" to a known instant.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Produces customer-facing booking references.
pub trait ReferenceGenerator: Send + Sync {
    /// Returns a fresh reference for a booking created at `now`.
    fn next_reference(&self, now: DateTime<Utc>) -> BookingReference;
}

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `BK` + base36 creation millis + 4 random base36 characters.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomReferenceGenerator;

impl RandomReferenceGenerator {
    /// Random suffix length.
    pub const SUFFIX_LEN: usize = 4;
}

impl ReferenceGenerator for RandomReferenceGenerator {
    fn next_reference(&self, now: DateTime<Utc>) -> BookingReference {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let mut raw = String::from("BK");
        raw.push_str(&to_base36(millis));

        let mut rng = rand::thread_rng();
        for _ in 0..Self::SUFFIX_LEN {
            raw.push(char::from(BASE36[rng.gen_range(0..BASE36.len())]));
        }
        BookingReference::new(raw)
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        // remainder < 36
        #[allow(clippy::cast_possible_truncation)]
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
