//! Hash validation for untrusted fetchers.

use super::{sha256_hex, Fetcher, YardError};

/// Wraps a fetcher and checks that returned bytes actually have the
/// SHA-256 hash that was requested.
pub struct Validate<F>(pub F);

impl<F: Fetcher> Fetcher for Validate<F> {
    fn fetch_sha256(&self, key: &str) -> Result<Vec<u8>, YardError> {
        let bytes = self.0.fetch_sha256(key)?;
        if sha256_hex(&bytes) != key {
            return Err(YardError::WrongHash);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<u8>);

    impl Fetcher for Fixed {
        fn fetch_sha256(&self, _key: &str) -> Result<Vec<u8>, YardError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_accepts_matching_hash() {
        let bytes = b"hello world".to_vec();
        let key = sha256_hex(&bytes);
        let fetcher = Validate(Fixed(bytes.clone()));
        assert_eq!(fetcher.fetch_sha256(&key).unwrap(), bytes);
    }

    #[test]
    fn test_rejects_wrong_hash() {
        let fetcher = Validate(Fixed(b"tampered".to_vec()));
        let key = sha256_hex(b"hello world");
        assert!(matches!(
            fetcher.fetch_sha256(&key),
            Err(YardError::WrongHash)
        ));
    }
}
