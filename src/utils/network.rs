use crate::error::{BlobstageError, Result};
use reqwest::Client;
use std::time::Duration;

/// Configuration for HTTP client with proper timeouts and user-friendly error handling
pub struct NetworkConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            user_agent: format!("blobstage/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a properly configured HTTP client with timeouts
pub fn create_http_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| BlobstageError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a transport-level reqwest failure into a readable message naming the host
pub fn classify_network_error(error: &reqwest::Error, url: &str) -> BlobstageError {
    let host = extract_host(url);

    if error.is_timeout() {
        return BlobstageError::connection_timeout(format!(
            "Request to '{}' timed out. The service may be slow or unreachable.",
            host
        ));
    }

    if error.is_connect() {
        if is_dns_resolution_error(error) {
            return BlobstageError::network(format!(
                "Unable to resolve '{}'. Please check your network connection and DNS settings.",
                host
            ));
        }

        return BlobstageError::network(format!(
            "Failed to connect to '{}'. Please check your network connection.",
            host
        ));
    }

    let lowered = error.to_string().to_lowercase();
    if lowered.contains("ssl") || lowered.contains("tls") || lowered.contains("certificate") {
        return BlobstageError::network(format!(
            "SSL/TLS error when contacting '{}'. This may be due to certificate issues or network security policies.",
            host
        ));
    }

    BlobstageError::network(format!("Network error when contacting '{}': {}", host, error))
}

fn is_dns_resolution_error(error: &reqwest::Error) -> bool {
    let error_msg = error.to_string().to_lowercase();
    let dns_indicators = [
        "dns",
        "name resolution",
        "name or service not known",
        "nodename nor servname provided",
        "temporary failure in name resolution",
        "no such host",
        "host not found",
        "getaddrinfo failed",
        "could not resolve host",
    ];

    dns_indicators
        .iter()
        .any(|&indicator| error_msg.contains(indicator))
}

fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "unknown-host".to_string())
}
