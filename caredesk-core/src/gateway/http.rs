//! REST gateway over reqwest
//!
//! Speaks the `/api/entities/{key}` contract served by `caredesk-server`.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{FilterQuery, Gateway, GatewayResult};
use crate::entity::Entity;
use crate::error::GatewayError;
use crate::query::SortState;

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct HttpGateway<E> {
    client: Client,
    base_url: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> HttpGateway<E> {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::other(format!("cannot build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse one connection pool across entity gateways.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            _entity: PhantomData,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/api/entities/{}", self.base_url, E::KEY)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    async fn send(&self, request: RequestBuilder, id: Option<&str>) -> GatewayResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(entity = E::KEY, %status, "gateway response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| if b.message.is_empty() { b.error } else { b.message })
            .unwrap_or(body);

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => GatewayError::rate_limited(message),
            StatusCode::NOT_FOUND => GatewayError::not_found(E::KEY, id.unwrap_or_default()),
            _ => GatewayError::Rejected {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
        response
            .json()
            .await
            .map_err(|e| GatewayError::other(format!("invalid {} response: {e}", E::KEY)))
    }
}

/// Connection and timeout failures are transient; everything else is not.
fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_connect() || err.is_timeout() {
        GatewayError::network(err.to_string())
    } else {
        GatewayError::other(err.to_string())
    }
}

#[async_trait]
impl<E: Entity> Gateway<E> for HttpGateway<E> {
    async fn list(&self, sort: Option<&SortState>) -> GatewayResult<Vec<E>> {
        let mut request = self.client.get(self.collection_url());
        if let Some(sort) = sort {
            request = request.query(&[("sort", sort.to_spec())]);
        }
        let response = self.send(request, None).await?;
        Self::decode(response).await
    }

    async fn filter(&self, query: &FilterQuery) -> GatewayResult<Vec<E>> {
        let request = self
            .client
            .post(format!("{}/filter", self.collection_url()))
            .json(query);
        let response = self.send(request, None).await?;
        Self::decode(response).await
    }

    async fn create(&self, record: &E) -> GatewayResult<E> {
        let request = self.client.post(self.collection_url()).json(record);
        let response = self.send(request, None).await?;
        Self::decode(response).await
    }

    async fn update(&self, id: &str, record: &E) -> GatewayResult<E> {
        let request = self.client.put(self.record_url(id)).json(record);
        let response = self.send(request, Some(id)).await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: &str) -> GatewayResult<()> {
        let request = self.client.delete(self.record_url(id));
        self.send(request, Some(id)).await?;
        Ok(())
    }

    async fn bulk_create(&self, records: &[E]) -> GatewayResult<()> {
        let request = self
            .client
            .post(format!("{}/bulk", self.collection_url()))
            .json(records);
        self.send(request, None).await?;
        Ok(())
    }
}
