use super::RpcError;
use crate::types::{EntryFunctionId, TransactionRecord};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Query capability used while polling for finality
#[async_trait]
pub trait TransactionQuery: Send + Sync {
    /// Fetch a transaction by id. `Ok(None)` means the network does not know
    /// the transaction yet.
    async fn get_transaction_by_id(&self, id: &str) -> Result<Option<TransactionRecord>, RpcError>;
}

/// Read-only contract queries
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn view(
        &self,
        function: &EntryFunctionId,
        type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value, RpcError>;

    async fn account_resource(&self, address: &str, resource_type: &str) -> Result<Value, RpcError>;
}

#[async_trait]
impl<T: TransactionQuery + ?Sized> TransactionQuery for Arc<T> {
    async fn get_transaction_by_id(&self, id: &str) -> Result<Option<TransactionRecord>, RpcError> {
        (**self).get_transaction_by_id(id).await
    }
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn view(
        &self,
        function: &EntryFunctionId,
        type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value, RpcError> {
        (**self).view(function, type_arguments, arguments).await
    }

    async fn account_resource(&self, address: &str, resource_type: &str) -> Result<Value, RpcError> {
        (**self).account_resource(address, resource_type).await
    }
}

/// Fullnode REST client
#[derive(Debug, Clone)]
pub struct RestNetworkClient {
    http: reqwest::Client,
    base: Url,
    timeout_ms: u64,
}

impl RestNetworkClient {
    pub fn new(node_url: &str, request_timeout: Duration) -> Result<Self, RpcError> {
        let base = Url::parse(node_url)
            .map_err(|e| RpcError::Configuration(format!("invalid node url {:?}: {}", node_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(RpcError::Configuration(format!(
                "node url cannot be used as a base: {}",
                node_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RpcError::Configuration(e.to_string()))?;
        Ok(Self {
            http,
            base,
            timeout_ms: request_timeout.as_millis() as u64,
        })
    }

    pub fn node_url(&self) -> &str {
        self.base.as_str()
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RpcError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RpcError::Configuration(format!("bad base url {}", self.base)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn endpoint(&self) -> &str {
        self.base.as_str()
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value, RpcError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::from_status(status.as_u16(), &body, self.endpoint()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.endpoint(), self.timeout_ms))
    }
}

#[async_trait]
impl TransactionQuery for RestNetworkClient {
    async fn get_transaction_by_id(&self, id: &str) -> Result<Option<TransactionRecord>, RpcError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RpcError::Validation(format!("invalid transaction id {:?}", id)));
        }
        let url = self.url(&["transactions", "by_hash", id])?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.endpoint(), self.timeout_ms))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(tx_id = %id, "Transaction not found yet");
            return Ok(None);
        }

        let body = self.read_json(response).await?;
        serde_json::from_value::<TransactionRecord>(body)
            .map(Some)
            .map_err(|e| RpcError::MalformedResponse {
                endpoint: self.endpoint().to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl ChainReader for RestNetworkClient {
    async fn view(
        &self,
        function: &EntryFunctionId,
        type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value, RpcError> {
        let url = self.url(&["view"])?;
        let body = serde_json::json!({
            "function": function.to_string(),
            "type_arguments": type_arguments,
            "arguments": arguments,
        });
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.endpoint(), self.timeout_ms))?;
        self.read_json(response).await
    }

    async fn account_resource(&self, address: &str, resource_type: &str) -> Result<Value, RpcError> {
        let url = self.url(&["accounts", address, "resource", resource_type])?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.endpoint(), self.timeout_ms))?;
        let mut resource = self.read_json(response).await?;
        // Resources are wrapped as {"type": ..., "data": {...}}
        if let Some(data) = resource.get_mut("data") {
            return Ok(data.take());
        }
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unparseable_node_url() {
        let err = RestNetworkClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RpcError::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_url_building_handles_trailing_slash() {
        let client = RestNetworkClient::new("http://localhost:8080/v1/", Duration::from_secs(1)).unwrap();
        let url = client.url(&["transactions", "by_hash", "0xabc"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/transactions/by_hash/0xabc");
    }

    #[test]
    fn test_resource_type_is_escaped() {
        let client = RestNetworkClient::new("http://localhost:8080/v1", Duration::from_secs(1)).unwrap();
        let url = client
            .url(&["accounts", "0x1", "resource", "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>"])
            .unwrap();
        assert!(url.as_str().starts_with("http://localhost:8080/v1/accounts/0x1/resource/"));
        assert!(!url.as_str().contains('<'));
    }
}
