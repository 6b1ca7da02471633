//! Error types for the fetch pipeline.
//!
//! Transport-level failures ([`TransportError`]) are what the backoff policy
//! classifies and retries. [`RequestError`] is what callers of
//! [`ScraperClient::send`](super::ScraperClient::send) see once the retry budget
//! is spent or a non-retryable failure occurred.

use std::error::Error as StdError;

use thiserror::Error;

/// A single failed network attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect / DNS failure.
    #[error("connection failed for {url}: {source}")]
    Connect {
        /// Target URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt exceeded its timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// Target URL.
        url: String,
        /// Underlying client error; absent for timeouts raised outside reqwest.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The configured proxy refused or failed the request.
    #[error("proxy failure for {url}: {source}")]
    Proxy {
        /// Target URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The remote sent a malformed or truncated HTTP message.
    #[error("protocol error from {url}: {source}")]
    Protocol {
        /// Target URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// TLS handshake or record failure.
    #[error("TLS failure for {url}: {source}")]
    Tls {
        /// Target URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// A redirect chain exceeded the hop limit.
    #[error("too many redirects from {url} (limit {limit})")]
    TooManyRedirects {
        /// The URL the chain started from.
        url: String,
        /// The hop limit that was hit.
        limit: usize,
    },

    /// Any other client error (redirect policy, body decoding, request building).
    #[error("request to {url} failed: {source}")]
    Other {
        /// Target URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },
}

impl TransportError {
    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout {
            url: url.into(),
            source: None,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps a reqwest error onto the transport taxonomy.
    ///
    /// reqwest's own predicates decide first. Only connect and request
    /// failures look further, at the typed causes below the reqwest error,
    /// to tell TLS, proxy and protocol failures apart. The reqwest error's
    /// own message embeds the request URL and is never inspected.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_builder() || source.is_redirect() || source.is_status() || source.is_decode() {
            return Self::Other { url, source };
        }
        if source.is_timeout() {
            return Self::Timeout {
                url,
                source: Some(source),
            };
        }
        match cause_kind(&source) {
            Some(CauseKind::Tls) => Self::Tls { url, source },
            Some(CauseKind::Proxy) => Self::Proxy { url, source },
            Some(CauseKind::Protocol) => Self::Protocol { url, source },
            Some(CauseKind::Connect) => Self::Connect { url, source },
            None if source.is_connect() => Self::Connect { url, source },
            None if source.is_body() || source.is_request() => Self::Protocol { url, source },
            None => Self::Other { url, source },
        }
    }

    /// Returns the URL the failed attempt targeted.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Connect { url, .. }
            | Self::Timeout { url, .. }
            | Self::Proxy { url, .. }
            | Self::Protocol { url, .. }
            | Self::Tls { url, .. }
            | Self::TooManyRedirects { url, .. }
            | Self::Other { url, .. }
            | Self::InvalidUrl { url } => url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CauseKind {
    Connect,
    Tls,
    Proxy,
    Protocol,
}

/// Classifies the causes underneath a reqwest error.
///
/// `std::io::Error` kinds are authoritative. TLS and proxy failures from the
/// connector carry no public type, so for connect errors their cause messages
/// are checked too. Cause messages below reqwest do not contain the URL.
fn cause_kind(error: &reqwest::Error) -> Option<CauseKind> {
    let mut current: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(cause) = current {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && let Some(kind) = io_kind(io)
        {
            // InvalidData after the handshake is a malformed message, not TLS.
            return Some(match kind {
                CauseKind::Tls if !error.is_connect() => CauseKind::Protocol,
                other => other,
            });
        }
        if error.is_connect() {
            let text = cause.to_string().to_ascii_lowercase();
            if ["certificate", "tls", "ssl", "handshake"]
                .iter()
                .any(|needle| text.contains(needle))
            {
                return Some(CauseKind::Tls);
            }
            if text.contains("proxy") {
                return Some(CauseKind::Proxy);
            }
        }
        current = cause.source();
    }
    None
}

fn io_kind(error: &std::io::Error) -> Option<CauseKind> {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::AddrNotAvailable
        | ErrorKind::HostUnreachable
        | ErrorKind::NetworkUnreachable
        | ErrorKind::NotConnected => Some(CauseKind::Connect),
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => Some(CauseKind::Protocol),
        // rustls reports handshake and certificate failures as InvalidData.
        ErrorKind::InvalidData => Some(CauseKind::Tls),
        _ => None,
    }
}

/// Terminal failure of one logical request.
///
/// Robots exclusion is *not* an error: a denied URL yields a synthetic 403
/// [`PageResponse`](super::PageResponse) instead.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Every attempt allowed by the backoff budget failed with a retryable error.
    #[error("giving up on {url} after {attempts} attempt(s): {source}")]
    RetryExhausted {
        /// Target URL.
        url: String,
        /// Number of attempts performed.
        attempts: u32,
        /// The final attempt's error, unmodified.
        #[source]
        source: TransportError,
    },

    /// A non-retryable transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Raised by [`PageResponse::error_for_status`](super::PageResponse::error_for_status).
    #[error("HTTP {status} from {url}")]
    Status {
        /// Target URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

impl RequestError {
    /// Returns the underlying transport error, if this failure carries one.
    #[must_use]
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::RetryExhausted { source, .. } => Some(source),
            Self::Transport(source) => Some(source),
            Self::Status { .. } => None,
        }
    }

    /// Consumes the error, returning the underlying transport error if any.
    #[must_use]
    pub fn into_transport(self) -> Option<TransportError> {
        match self {
            Self::RetryExhausted { source, .. } | Self::Transport(source) => Some(source),
            Self::Status { .. } => None,
        }
    }

    /// Returns the number of attempts made before giving up, when known.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Failure to construct a [`ScraperClient`](super::ScraperClient).
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The supplied configuration was rejected.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// The HTTP client could not be built (TLS backend, proxy settings).
    #[error("failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),
}
