use crate::error::{MusicCastError, Result};
use crate::protocol::{decode_envelope, Method, Request};
use crate::types::ReceiverAddress;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request timeout used when none is configured
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP connection to one receiver's control API
///
/// Executes single requests and classifies the answer. Never retries; a
/// failed request is reported to the caller, who decides whether to try
/// again on the next poll.
#[derive(Debug, Clone)]
pub struct Connection {
    address: ReceiverAddress,
    http: reqwest::Client,
    timeout: Duration,
}

impl Connection {
    /// Create a connection to `address` with the default request timeout
    pub fn new(address: ReceiverAddress) -> Result<Self> {
        Self::with_timeout(address, REQUEST_TIMEOUT)
    }

    /// Create a connection whose requests give up after `timeout`
    ///
    /// Redirects are not followed.
    pub fn with_timeout(address: ReceiverAddress, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            address,
            http,
            timeout,
        })
    }

    /// Receiver this connection talks to
    pub fn address(&self) -> &ReceiverAddress {
        &self.address
    }

    /// Host part of the receiver address, without port
    pub fn host(&self) -> &str {
        &self.address.host
    }

    /// Send a request and decode the response envelope into `T`
    pub async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let body = self.send(request).await?;
        decode_envelope(&body)
    }

    /// Send a request and return the raw body of a 200 response
    pub async fn send(&self, request: Request) -> Result<String> {
        let url = format!("{}{}", self.address.base_url(), request.path);
        let method = request.method();

        let mut builder = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        builder = builder.timeout(self.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if method == Method::Post {
            let json = serde_json::to_string(&request.body)?;
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(json);
        }

        tracing::debug!(">> {} {} {:?}", method, url, request.query);

        let response = builder.send().await.map_err(|e| {
            tracing::debug!("Request to {} failed: {}", url, e);
            MusicCastError::Communication(e)
        })?;

        let status = response.status().as_u16();
        match status {
            200 => {
                let body = response.text().await?;
                tracing::debug!("<< {} {}", status, body);
                Ok(body)
            }
            400 | 401 => Err(MusicCastError::Credentials { status }),
            _ => Err(MusicCastError::UnexpectedStatus(status)),
        }
    }

    /// Download raw bytes from an absolute URL, e.g. album art
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(">> GET {}", url);
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(MusicCastError::UnexpectedStatus(status));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
