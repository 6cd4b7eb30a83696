//! A disk-backed caching fetcher.

use std::fs;
use std::path::PathBuf;

use super::{DirectoryFetcher, Fetcher, YardError};

/// Serves scraps from a cache directory, falling back to another fetcher
/// and writing fetched scraps back to disk.
pub struct CachingFetcher {
    path: PathBuf,
    main: DirectoryFetcher,
    fallback: Box<dyn Fetcher>,
}

impl CachingFetcher {
    /// Creates the cache directory if needed.
    pub fn new(path: impl Into<PathBuf>, fallback: Box<dyn Fetcher>) -> Result<Self, YardError> {
        let path = path.into();
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(CachingFetcher {
            main: DirectoryFetcher::new(path.clone()),
            path,
            fallback,
        })
    }
}

impl Fetcher for CachingFetcher {
    fn fetch_sha256(&self, key: &str) -> Result<Vec<u8>, YardError> {
        if let Ok(bytes) = self.main.fetch_sha256(key) {
            return Ok(bytes);
        }

        let bytes = self.fallback.fetch_sha256(key)?;
        fs::write(self.path.join(key), &bytes)?;
        Ok(bytes)
    }
}
