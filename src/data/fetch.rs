use std::io::{self, Read};
use std::time::Duration;

/// Largest response body accepted by [`HttpFetcher`].
const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Retrieves a remote file by URL.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> io::Result<Vec<u8>>;
}

/// Blocking HTTP(S) download through `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .timeout_read(Duration::from_secs(60))
            .build();
        HttpFetcher { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher::new()
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> io::Result<Vec<u8>> {
        let response = self.agent
            .get(url)
            .call()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("GET {url}: {e}")))?;
        read_capped(response.into_reader(), MAX_DOWNLOAD_BYTES)
            .map_err(|e| io::Error::new(e.kind(), format!("GET {url}: {e}")))
    }
}

/// Reads `reader` to the end, failing instead of truncating when it holds
/// more than `limit` bytes.
fn read_capped<R: Read>(reader: R, limit: u64) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("response larger than {limit} bytes"),
        ));
    }
    Ok(bytes)
}
