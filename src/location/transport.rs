//! Blocking HTTP transport used by the online providers.

use super::types::Result;
#[cfg(any(feature = "online", feature = "google"))]
use super::types::Error;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("place2nuts/", env!("CARGO_PKG_VERSION"));

/// Issues a GET request and returns the response body.
///
/// Implementations block until the body is read. A transport may be shared,
/// but the resolver only ever has one request in flight.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<String>;
}

/// [`Transport`] backed by a `ureq` agent.
#[cfg(any(feature = "online", feature = "google"))]
pub struct HttpTransport {
    agent: ureq::Agent,
}

#[cfg(any(feature = "online", feature = "google"))]
impl HttpTransport {
    pub fn new(timeout: Option<std::time::Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new().user_agent(USER_AGENT);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Self { agent: builder.build() }
    }
}

#[cfg(any(feature = "online", feature = "google"))]
impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "GET");
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => Error::Transport(format!("{} returned HTTP {}", url, code)),
            other => Error::Transport(other.to_string()),
        })?;
        response
            .into_string()
            .map_err(|e| Error::Transport(format!("reading response of {}: {}", url, e)))
    }
}
