//! Opaque identifier generation.
//!
//! External ids carry a short prefix and look like
//! `<prefix>_<base36-timestamp>_<random9>`, e.g. `svc_k3f9a2_x7q2p9z1a`.

use chrono::Utc;
use uuid::Uuid;

fn to_base36(mut n: u64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 alphabet is ascii")
}

/// Nine base36 characters derived from a random v4 UUID.
fn random9() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let n = u64::from_be_bytes(bytes[0..8].try_into().expect("8 bytes"));
    let s = to_base36(n);
    if s.len() >= 9 {
        s[s.len() - 9..].to_string()
    } else {
        format!("{:0>9}", s)
    }
}

/// Generate a new prefixed identifier, e.g. `gen_id("svc")` -> `svc_k3f9a2_x7q2p9z1a`.
pub fn gen_id(prefix: &str) -> String {
    let ts = Utc::now().timestamp_millis().max(0) as u64;
    format!("{prefix}_{}_{}", to_base36(ts), random9())
}

pub const SERVICE_PREFIX: &str = "svc";
pub const RULE_PREFIX: &str = "rule";
pub const FAILOVER_PREFIX: &str = "fo";
pub const SLA_TARGET_PREFIX: &str = "sla";
pub const SLA_MEASUREMENT_PREFIX: &str = "meas";
pub const ENDPOINT_PREFIX: &str = "ep";
pub const JOB_PREFIX: &str = "job";
