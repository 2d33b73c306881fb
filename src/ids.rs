//! Object identifiers: 24 lowercase hex characters, time-ordered.

use std::sync::atomic::{AtomicU64, Ordering};

use jiff::Timestamp;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a fresh identifier: 4 bytes of seconds, 8 bytes of a
/// process-wide counter seeded from the clock's sub-second part.
pub fn generate() -> String {
    let now = Timestamp::now();
    let seed = u64::from(now.subsec_nanosecond().unsigned_abs()) << 24;
    let _ = COUNTER.compare_exchange(0, seed | 1, Ordering::Relaxed, Ordering::Relaxed);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&(now.as_second() as u32).to_be_bytes());
    bytes[4..].copy_from_slice(&count.to_be_bytes());
    hex::encode(bytes)
}

pub fn is_valid(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
