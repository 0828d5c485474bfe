//! `reqwest`-backed transport.

use std::time::Duration;

use futures::FutureExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use super::{PendingBeacon, PendingResponse, Transport, TransportResponse};
use crate::error::{Result, TransportError, TransportResult};

/// Content type a browser attaches to a string beacon.
const BEACON_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// HTTP transport for hosts with a network stack of their own.
///
/// A beacon here is a POST whose response is dropped unread.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a 10 second request timeout.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxies, custom timeouts, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn beacon(&self, url: &str, body: String) -> TransportResult<PendingBeacon> {
        debug!(url = %url, bytes = body.len(), "Sending beacon");
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, BEACON_CONTENT_TYPE)
            .body(body);

        Ok(async move {
            request.send().await?;
            Ok::<_, TransportError>(())
        }
        .boxed())
    }

    fn post(&self, url: &str, body: String) -> TransportResult<PendingResponse> {
        debug!(url = %url, bytes = body.len(), "Sending request");
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        Ok(async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Ok::<_, TransportError>(TransportResponse { status, body })
        }
        .boxed())
    }
}
