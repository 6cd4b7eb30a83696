//! Yards: content-addressed scrap storage.
//!
//! A yard is a key-value store of scraps keyed by the lowercase hex
//! SHA-256 of their source bytes. Fetchers layer: a directory on disk, a
//! sequence of fallbacks, an HTTP yard, a hash validator and a disk
//! cache.

mod cache;
mod http;
mod valid;

use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use cache::CachingFetcher;
pub use http::HttpYard;
pub use valid::Validate;

#[derive(Debug, Error)]
pub enum YardError {
    #[error("no scrap found")]
    NotFound,
    #[error("fetched bytes had wrong hash")]
    WrongHash,
    #[error("http get failed with status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Transport(String),
}

/// Retrieves scraps by their SHA-256 hashes.
pub trait Fetcher {
    fn fetch_sha256(&self, key: &str) -> Result<Vec<u8>, YardError>;
}

/// Stores scraps, returning their SHA-256 hashes.
pub trait Pusher {
    fn push_scrap(&self, data: &[u8]) -> Result<String, YardError>;
}

/// The lowercase hex SHA-256 of some bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_lower(&hasher.finalize())
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// A fetcher reading files named by their hash from a directory.
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryFetcher { root: root.into() }
    }
}

impl Fetcher for DirectoryFetcher {
    fn fetch_sha256(&self, key: &str) -> Result<Vec<u8>, YardError> {
        match fs::read(self.root.join(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(YardError::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}

/// Tries each fetcher in order, returning the first success.
pub struct InOrder(pub Vec<Box<dyn Fetcher>>);

impl Fetcher for InOrder {
    fn fetch_sha256(&self, key: &str) -> Result<Vec<u8>, YardError> {
        for fetcher in &self.0 {
            if let Ok(bytes) = fetcher.fetch_sha256(key) {
                return Ok(bytes);
            }
        }
        Err(YardError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<Vec<u8>>);

    impl Fetcher for Fixed {
        fn fetch_sha256(&self, _key: &str) -> Result<Vec<u8>, YardError> {
            match &self.0 {
                Some(bytes) => Ok(bytes.clone()),
                None => Err(YardError::NotFound),
            }
        }
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_in_order_returns_first_success() {
        let fetcher = InOrder(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some(b"hit".to_vec()))),
            Box::new(Fixed(Some(b"shadowed".to_vec()))),
        ]);
        assert_eq!(fetcher.fetch_sha256("any").unwrap(), b"hit");
    }

    #[test]
    fn test_in_order_not_found_when_all_miss() {
        let fetcher = InOrder(vec![Box::new(Fixed(None))]);
        assert!(matches!(
            fetcher.fetch_sha256("any"),
            Err(YardError::NotFound)
        ));
    }
}
