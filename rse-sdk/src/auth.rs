//! Auth token handling shared by the gate and by token seeding tools.
//!
//! Tokens are never checked directly. The server looks up a cache key
//! derived from the token:
//!
//! ```text
//! key = prefix + token                        if len(key) <  threshold
//! key = SHA-512(prefix + token) as "AB-CD-.." if len(key) >= threshold
//! ```
//!
//! The hashed form is upper-case hex with a dash between every byte, which
//! is what the token authority writes into the cache.

/// Header carrying the caller's auth token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Build the cache key for `token`.
pub fn format_cache_key(prefix: &str, token: &str, hashing_threshold: usize) -> String {
    let key = format!("{prefix}{token}");
    if key.len() < hashing_threshold {
        return key;
    }

    let digest = ring::digest::digest(&ring::digest::SHA512, key.as_bytes());
    dashed_hex(digest.as_ref())
}

fn dashed_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}
