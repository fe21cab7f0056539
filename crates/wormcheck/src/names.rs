//! Random bucket names and object payloads.

use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};

/// Prefix of every bucket the suite creates.
pub const BUCKET_PREFIX: &str = "versioning-test-";

/// Longest bucket name S3 accepts.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Generate a random string of the given length (lowercase alphanumerics).
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Generate a random, S3-compliant bucket name.
pub fn random_bucket_name() -> String {
    let mut name = format!("{BUCKET_PREFIX}{}", random_string(30));
    name.truncate(MAX_BUCKET_NAME_LEN);
    name
}

/// Generate random bytes of the given size.
pub fn random_bytes(size: usize) -> Bytes {
    let mut buf = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut buf);
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_is_s3_compliant() {
        for _ in 0..32 {
            let name = random_bucket_name();
            assert!(name.starts_with(BUCKET_PREFIX));
            assert!((3..=MAX_BUCKET_NAME_LEN).contains(&name.len()));
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!name.ends_with('-'));
        }
    }

    #[test]
    fn test_random_bytes_size() {
        assert_eq!(random_bytes(0).len(), 0);
        assert_eq!(random_bytes(4096).len(), 4096);
    }
}
