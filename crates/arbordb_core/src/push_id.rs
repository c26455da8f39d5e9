//! Chronologically ordered push ids.
//!
//! A push id is 20 characters: 8 characters of millisecond timestamp followed
//! by 12 random characters, both drawn from an alphabet whose ASCII order
//! matches its digit order. Ids therefore sort lexicographically by creation
//! time. Ids generated within the same millisecond (or after the clock steps
//! backwards) reuse the previous suffix incremented by one, like an odometer,
//! so they still sort in generation order.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// The 64 push id digits in ascending ASCII order.
pub const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Length of a push id.
pub const PUSH_ID_LEN: usize = TIMESTAMP_LEN + RANDOM_LEN;

const TIMESTAMP_LEN: usize = 8;
const RANDOM_LEN: usize = 12;

struct GeneratorState {
    last_ts: u64,
    last_suffix: [u8; RANDOM_LEN],
    rng: StdRng,
}

/// Generates push ids.
///
/// The generator is shared by reference; all state lives behind one mutex so
/// concurrent callers always observe strictly increasing ids.
pub struct PushIdGenerator {
    state: Mutex<GeneratorState>,
}

impl PushIdGenerator {
    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a deterministic generator.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                last_ts: 0,
                last_suffix: [0; RANDOM_LEN],
                rng,
            }),
        }
    }

    /// Generates an id for the current wall-clock time.
    pub fn generate(&self) -> String {
        self.generate_at(now_millis())
    }

    /// Generates an id for `now_ms` milliseconds since the Unix epoch.
    pub fn generate_at(&self, now_ms: u64) -> String {
        let mut state = self.state.lock();
        let mut ts = now_ms;
        if ts <= state.last_ts {
            ts = state.last_ts;
            if !increment(&mut state.last_suffix) {
                ts += 1;
                randomize(&mut state);
            }
        } else {
            randomize(&mut state);
        }
        state.last_ts = ts;

        let mut id = String::with_capacity(PUSH_ID_LEN);
        id.extend(encode_timestamp(ts).iter().map(|&b| char::from(b)));
        id.extend(
            state
                .last_suffix
                .iter()
                .map(|&digit| char::from(PUSH_CHARS[usize::from(digit)])),
        );
        id
    }

    /// Extracts the creation time in milliseconds from a push id.
    #[must_use]
    pub fn decode_timestamp(id: &str) -> Option<u64> {
        if id.len() != PUSH_ID_LEN {
            return None;
        }
        id.bytes().take(TIMESTAMP_LEN).try_fold(0u64, |acc, b| {
            let digit = PUSH_CHARS.iter().position(|&c| c == b)?;
            Some(acc * 64 + digit as u64)
        })
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PushIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushIdGenerator")
            .field("last_ts", &self.state.lock().last_ts)
            .finish_non_exhaustive()
    }
}

fn randomize(state: &mut GeneratorState) {
    for digit in &mut state.last_suffix {
        *digit = state.rng.gen_range(0..64);
    }
}

/// Adds one to the suffix. Returns false when every digit wrapped.
fn increment(suffix: &mut [u8; RANDOM_LEN]) -> bool {
    for digit in suffix.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return true;
        }
    }
    false
}

fn encode_timestamp(mut ts: u64) -> [u8; TIMESTAMP_LEN] {
    let mut out = [PUSH_CHARS[0]; TIMESTAMP_LEN];
    for slot in out.iter_mut().rev() {
        *slot = PUSH_CHARS[(ts % 64) as usize];
        ts /= 64;
    }
    out
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
