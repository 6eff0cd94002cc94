//! # JSON-RPC Node Client
//!
//! HTTP JSON-RPC connection to a consensus node's message pool.
//!
//! The node answers `mpool_batchPushUntrusted` with one entry per accepted
//! message. A transport or call error means nothing can be assumed
//! accepted, so it is reported with `accepted: 0`.

use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use msg_publisher::{DialError, NodeDialer, NodeRpcClient, PushRejected};
use shared_types::{NodeDescriptor, NodeId, SignedMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// RPC method used for untrusted batch pushes.
pub const PUSH_UNTRUSTED_METHOD: &str = "mpool_batchPushUntrusted";

/// Dials nodes over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct JsonRpcDialer {
    request_timeout: Duration,
}

impl JsonRpcDialer {
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl NodeDialer for JsonRpcDialer {
    async fn dial(&self, node: &NodeDescriptor) -> Result<Arc<dyn NodeRpcClient>, DialError> {
        let client = JsonRpcNodeClient::connect(node, self.request_timeout)?;
        debug!(node = %node.id, url = %node.url, "Dialed node");
        Ok(Arc::new(client))
    }
}

/// One HTTP JSON-RPC connection.
pub struct JsonRpcNodeClient {
    node: NodeId,
    client: HttpClient,
}

impl JsonRpcNodeClient {
    /// Build a client for `node`. The HTTP connection itself is opened lazily.
    ///
    /// # Errors
    ///
    /// `DialError` if the token is not a valid header value or the URL is
    /// rejected by the HTTP client.
    pub fn connect(node: &NodeDescriptor, request_timeout: Duration) -> Result<Self, DialError> {
        let dial_error = |reason: String| DialError {
            node: node.id.clone(),
            url: node.url.clone(),
            reason,
        };

        let headers = auth_headers(&node.token).map_err(dial_error)?;
        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(request_timeout)
            .build(&node.url)
            .map_err(|e| dial_error(e.to_string()))?;

        Ok(Self {
            node: node.id.clone(),
            client,
        })
    }
}

#[async_trait]
impl NodeRpcClient for JsonRpcNodeClient {
    async fn push_message_batch_untrusted(
        &self,
        batch: &[SignedMessage],
    ) -> Result<usize, PushRejected> {
        let mut params = ArrayParams::new();
        params
            .insert(batch)
            .map_err(|e| PushRejected::new(0, e.to_string()))?;

        let accepted: Vec<serde_json::Value> = self
            .client
            .request(PUSH_UNTRUSTED_METHOD, params)
            .await
            .map_err(|e| push_rejected(&e))?;

        debug!(node = %self.node, accepted = accepted.len(), "Batch pushed");
        Ok(accepted.len())
    }
}

fn auth_headers(token: &str) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    if token.is_empty() {
        return Ok(headers);
    }
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| "token is not a valid header value".to_string())?;
    headers.insert("Authorization", value);
    Ok(headers)
}

/// A failed call gives no accepted count, so nothing is assumed accepted.
fn push_rejected(err: &ClientError) -> PushRejected {
    PushRejected::new(0, rejection_reason(err))
}

/// Node-side error text when the call reached the node, otherwise the
/// client's own description.
fn rejection_reason(err: &ClientError) -> String {
    match err {
        ClientError::Call(obj) => obj.message().to_string(),
        other => other.to_string(),
    }
}
