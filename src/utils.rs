//! Utility functions for the matchmaking engine

use crate::types::{MatchId, Tick};
use chrono::{DateTime, Utc};
use rand::Rng;

const MATCH_ID_PREFIX: &str = "match_";
const MATCH_ID_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a match id that is not rejected by `is_taken`
///
/// Ids look like `match_k3x9a0b2c`. Collisions are retried with a fresh draw.
pub fn generate_match_id<R, F>(rng: &mut R, is_taken: F) -> MatchId
where
    R: Rng + ?Sized,
    F: Fn(&str) -> bool,
{
    loop {
        let suffix: String = (0..MATCH_ID_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        let id = format!("{}{}", MATCH_ID_PREFIX, suffix);
        if !is_taken(&id) {
            return id;
        }
    }
}

/// Numeric token published for a match id: its decimal digits read as one number
///
/// Ids without digits map to 0.
pub fn match_token(match_id: &str) -> i64 {
    let digits: String = match_id.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Integer division rounding toward positive infinity
pub fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder != 0 && ((remainder > 0) == (denominator > 0)) {
        quotient + 1
    } else {
        quotient
    }
}

/// Ticks elapsed between two logical ticks, saturating at zero
pub fn ticks_since(now: Tick, since: Tick) -> u64 {
    now.saturating_sub(since)
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
