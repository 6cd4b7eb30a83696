//! An HTTP yard client.

use std::io::Read;

use super::{Fetcher, Pusher, YardError};

/// Fetches scraps with `GET <hostname><key>` and pushes them with a
/// `POST` of the raw source, mirroring the scrapyard wire protocol.
pub struct HttpYard {
    hostname: String,
}

impl HttpYard {
    pub fn new(hostname: impl Into<String>) -> Self {
        HttpYard {
            hostname: hostname.into(),
        }
    }
}

impl Fetcher for HttpYard {
    fn fetch_sha256(&self, key: &str) -> Result<Vec<u8>, YardError> {
        let url = format!("{}{}", self.hostname, key);
        let response = ureq::get(&url)
            .set("Accept", "application/scrap")
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => YardError::HttpStatus(code),
                other => YardError::Transport(other.to_string()),
            })?;

        if response.status() != 200 {
            return Err(YardError::HttpStatus(response.status()));
        }

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(YardError::Io)?;
        Ok(bytes)
    }
}

impl Pusher for HttpYard {
    fn push_scrap(&self, data: &[u8]) -> Result<String, YardError> {
        let response = ureq::post(&self.hostname)
            .set("Content-Type", "application/scrap")
            .send_bytes(data)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => YardError::HttpStatus(code),
                other => YardError::Transport(other.to_string()),
            })?;

        response
            .into_string()
            .map_err(|err| YardError::Transport(err.to_string()))
    }
}
