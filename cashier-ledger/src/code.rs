//! Ticket code generation
//!
//! Codes look like `TICK-00042-1718000000000-317`: client ID padded to five
//! digits, creation instant in epoch milliseconds, three random digits.
//! Two tickets of the same client created in the same millisecond collide
//! with probability 1/1000; the store rejects the duplicate and the ledger
//! retries with a fresh code.

use crate::types::ClientId;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Prefix of every ticket code
pub const CODE_PREFIX: &str = "TICK";

/// Build a code from explicit inputs
pub fn generate_code(client_id: ClientId, now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    let suffix: u16 = rng.gen_range(0..1000);
    format!(
        "{}-{:05}-{}-{:03}",
        CODE_PREFIX,
        client_id.0,
        now.timestamp_millis(),
        suffix
    )
}

/// Build a code for the current instant with the thread-local RNG
pub fn new_code(client_id: ClientId) -> String {
    generate_code(client_id, Utc::now(), &mut rand::thread_rng())
}
