//! Fetcher layering tests: directory, sequence, validation and the disk
//! cache.

use std::fs;

use scrapscript::yards::{
    sha256_hex, CachingFetcher, DirectoryFetcher, Fetcher, InOrder, Validate, YardError,
};

struct Missing;

impl Fetcher for Missing {
    fn fetch_sha256(&self, _key: &str) -> Result<Vec<u8>, YardError> {
        Err(YardError::NotFound)
    }
}

struct Fixed(Vec<u8>);

impl Fetcher for Fixed {
    fn fetch_sha256(&self, _key: &str) -> Result<Vec<u8>, YardError> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_directory_fetcher_reads_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let body = b"1 + 2".to_vec();
    let key = sha256_hex(&body);
    fs::write(dir.path().join(&key), &body).unwrap();

    let fetcher = DirectoryFetcher::new(dir.path());
    assert_eq!(fetcher.fetch_sha256(&key).unwrap(), body);
    assert!(matches!(
        fetcher.fetch_sha256("missing"),
        Err(YardError::NotFound)
    ));
}

#[test]
fn test_in_order_falls_through() {
    let dir = tempfile::tempdir().unwrap();
    let body = b"2".to_vec();
    let key = sha256_hex(&body);
    fs::write(dir.path().join(&key), &body).unwrap();

    let fetcher = InOrder(vec![
        Box::new(Missing),
        Box::new(DirectoryFetcher::new(dir.path())),
    ]);
    assert_eq!(fetcher.fetch_sha256(&key).unwrap(), body);
}

#[test]
fn test_validate_rejects_tampered_bytes() {
    let body = b"3".to_vec();
    let key = sha256_hex(&body);

    let good = Validate(Fixed(body.clone()));
    assert_eq!(good.fetch_sha256(&key).unwrap(), body);

    let bad = Validate(Fixed(b"4".to_vec()));
    assert!(matches!(bad.fetch_sha256(&key), Err(YardError::WrongHash)));
}

#[test]
fn test_cache_writes_back() {
    let cache = tempfile::tempdir().unwrap();
    let body = b"5".to_vec();
    let key = sha256_hex(&body);

    let fetcher = CachingFetcher::new(cache.path(), Box::new(Fixed(body.clone()))).unwrap();
    assert_eq!(fetcher.fetch_sha256(&key).unwrap(), body);

    // The scrap is now on disk and survives a dead fallback.
    assert_eq!(fs::read(cache.path().join(&key)).unwrap(), body);
    let offline = CachingFetcher::new(cache.path(), Box::new(Missing)).unwrap();
    assert_eq!(offline.fetch_sha256(&key).unwrap(), body);
}

#[test]
fn test_cache_misses_propagate() {
    let cache = tempfile::tempdir().unwrap();
    let fetcher = CachingFetcher::new(cache.path(), Box::new(Missing)).unwrap();
    assert!(matches!(
        fetcher.fetch_sha256("anything"),
        Err(YardError::NotFound)
    ));
}

#[test]
fn test_cache_creates_its_directory() {
    let parent = tempfile::tempdir().unwrap();
    let nested = parent.path().join("scrapscript/sha256");
    let _ = CachingFetcher::new(&nested, Box::new(Missing)).unwrap();
    assert!(nested.is_dir());
}
