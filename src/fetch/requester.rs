//! Signed GET requests over the shared transport.

use crate::auth::{Secret, signed_headers};
use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Issues GET requests, attaching `Authorization`/`Timestamp` headers
/// whenever a secret resolves for the calling application.
#[derive(Clone)]
pub struct SignedRequester {
    transport: Arc<dyn HttpTransport>,
    secret: Option<Arc<Secret>>,
}

impl SignedRequester {
    /// Create a requester over `transport`.
    pub fn new(transport: Arc<dyn HttpTransport>, secret: Option<Secret>) -> Self {
        Self {
            transport,
            secret: secret.map(Arc::new),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Build the request for `url` on behalf of `app_id` without sending it.
    pub fn request(&self, app_id: &str, url: String, timeout: Duration) -> HttpRequest {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let headers = signed_headers(self.secret.as_deref(), app_id, &url, timestamp);
        HttpRequest::get(url, timeout).with_headers(headers)
    }

    /// Send a signed GET for `url` on behalf of `app_id`.
    pub async fn get(&self, app_id: &str, url: String, timeout: Duration) -> Result<HttpResponse> {
        let request = self.request(app_id, url, timeout);
        debug!(
            app_id,
            url = %request.url,
            signed = !request.headers.is_empty(),
            "issuing request"
        );
        self.transport.get(request).await
    }
}
