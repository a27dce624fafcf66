//! The resource string hash.
//!
//! Jenkins one-at-a-time over the lowercased UTF-8 bytes. Shader filenames,
//! dictionary keys and unnamed bones are all keyed by this value.

/// Hash `text` case-insensitively.
#[must_use]
pub fn joaat(text: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in text.bytes() {
        hash = hash.wrapping_add(u32::from(byte.to_ascii_lowercase()));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// Format a hash as the `hash_<hex>` placeholder used for unknown names.
#[must_use]
pub fn hash_name(hash: u32) -> String {
    format!("hash_{hash:08X}")
}

/// Parse a `hash_<hex>` placeholder back into its value.
#[must_use]
pub fn parse_hash_name(text: &str) -> Option<u32> {
    let hex = text.strip_prefix("hash_").or_else(|| text.strip_prefix("HASH_"))?;
    u32::from_str_radix(hex, 16).ok()
}
