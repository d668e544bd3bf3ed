use async_trait::async_trait;
use floatip_core::cloud::{AssignResponse, CloudProvider, FloatingIp, FloatingIpId, Server, ServerId};
use floatip_core::CloudError;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

use crate::schema::{
    ActionResponse, AssignRequest, ErrorResponse, FloatingIpListResponse, Paginated,
    ServerListResponse,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";

const PER_PAGE: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HcloudClient talks to the Hetzner Cloud REST API with a project API token.
#[derive(Clone)]
pub struct HcloudClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl std::fmt::Debug for HcloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HcloudClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HcloudClient {
    pub fn new(token: &str, endpoint: &str) -> Result<Self, CloudError> {
        if token.trim().is_empty() {
            return Err(CloudError::Config("empty API token".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("floatip-controller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Follow `meta.pagination.next_page` until the listing is exhausted.
    async fn list_all<R>(&self, path: &str) -> Result<Vec<R::Item>, CloudError>
    where
        R: Paginated + DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let response = self
                .http
                .get(self.url(path))
                .bearer_auth(&self.token)
                .query(&[("page", page), ("per_page", PER_PAGE)])
                .send()
                .await
                .map_err(|e| CloudError::Transport(e.to_string()))?;

            let body: R = decode(check(response).await?).await?;
            let next = body.next_page();
            items.extend(body.into_items());
            trace!(path = %path, page, count = items.len(), "fetched listing page");

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }
        Ok(items)
    }
}

/// Turn an API error status into `CloudError::Api`, keeping the API's own error code.
async fn check(response: Response) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("unknown").to_string(),
            text,
        ),
    };
    Err(CloudError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CloudError> {
    response
        .json::<T>()
        .await
        .map_err(|e| CloudError::Decode(e.to_string()))
}

#[async_trait]
impl CloudProvider for HcloudClient {
    async fn list_servers(&self) -> Result<Vec<Server>, CloudError> {
        let servers = self.list_all::<ServerListResponse>("/servers").await?;
        Ok(servers.into_iter().map(Into::into).collect())
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, CloudError> {
        let floating_ips = self
            .list_all::<FloatingIpListResponse>("/floating_ips")
            .await?;
        Ok(floating_ips.into_iter().map(Into::into).collect())
    }

    async fn assign_floating_ip(
        &self,
        floating_ip: FloatingIpId,
        server: ServerId,
    ) -> Result<AssignResponse, CloudError> {
        let response = self
            .http
            .post(self.url(&format!("/floating_ips/{}/actions/assign", floating_ip)))
            .bearer_auth(&self.token)
            .json(&AssignRequest { server })
            .send()
            .await
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        let response = check(response).await?;
        let status = response.status();
        // The status is validated by the caller; the body only carries the action id.
        let action_id = if status == StatusCode::CREATED {
            decode::<ActionResponse>(response)
                .await
                .ok()
                .map(|a| a.action.id)
        } else {
            None
        };
        debug!(floating_ip, server, status = status.as_u16(), ?action_id, "assign action sent");

        Ok(AssignResponse {
            status: status.as_u16(),
            action_id,
        })
    }
}
