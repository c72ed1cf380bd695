//! Session API clients.
//!
//! [`SessionApi`] is the seam between the sync layer and the backend. The HTTP
//! implementation talks to the AgentHive REST surface:
//!
//! ```text
//! GET    /api/v1/sessions?limit=N   -> SessionSummary[]
//! POST   /api/v1/sessions           -> SessionSummary
//! GET    /api/v1/sessions/{id}      -> Session (summary + messages)
//! PATCH  /api/v1/sessions/{id}      -> ()
//! DELETE /api/v1/sessions/{id}      -> ()
//! POST   /agent/query               -> () (reply is streamed out of band)
//! GET    /health                    -> ()
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hive_core::{RemoteSession, SessionPatch, SessionSummary};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Body of `POST /agent/query`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentQuery {
    pub session_id: String,
    pub query: String,
    pub explicit_agent: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

/// Operations the client needs from the backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn list_sessions(&self, limit: usize) -> ClientResult<Vec<SessionSummary>>;

    async fn create_session(&self, title: Option<String>) -> ClientResult<SessionSummary>;

    async fn get_session(&self, id: &str) -> ClientResult<RemoteSession>;

    async fn update_session(&self, id: &str, patch: SessionPatch) -> ClientResult<()>;

    /// Deleting a session that does not exist succeeds.
    async fn delete_session(&self, id: &str) -> ClientResult<()>;

    async fn query_agent(&self, query: AgentQuery) -> ClientResult<()>;

    async fn health(&self) -> ClientResult<()>;
}

/// `SessionApi` over HTTP
pub struct HttpSessionApi {
    client: reqwest::Client,
    base_url: String,
    base: Url,
    health_timeout: Duration,
}

impl HttpSessionApi {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| {
            ClientError::InvalidConfig(format!("invalid API base URL {:?}: {}", base_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(format!(
                "API base URL cannot carry a path: {:?}",
                base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            base,
            health_timeout: config.health_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended by `segments`, each percent-encoded on its own so
    /// an id can never add path components.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn sessions_url(&self) -> Url {
        self.endpoint(&["api", "v1", "sessions"])
    }

    fn session_url(&self, id: &str) -> Url {
        self.endpoint(&["api", "v1", "sessions", id])
    }

    /// Turn a non-success status into [`ClientError::Status`].
    async fn check(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn list_sessions(&self, limit: usize) -> ClientResult<Vec<SessionSummary>> {
        debug!(limit, "GET sessions");
        let response = self
            .client
            .get(self.sessions_url())
            .query(&[("limit", limit)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_session(&self, title: Option<String>) -> ClientResult<SessionSummary> {
        debug!(?title, "POST sessions");
        let response = self
            .client
            .post(self.sessions_url())
            .json(&CreateSessionBody {
                title: title.as_deref(),
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn get_session(&self, id: &str) -> ClientResult<RemoteSession> {
        debug!(session = %id, "GET session");
        let response = self.client.get(self.session_url(id)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> ClientResult<()> {
        debug!(session = %id, ?patch, "PATCH session");
        let response = self
            .client
            .patch(self.session_url(id))
            .json(&patch)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> ClientResult<()> {
        debug!(session = %id, "DELETE session");
        let response = self.client.delete(self.session_url(id)).send().await?;
        match Self::check(response).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                warn!(session = %id, "Session already gone on backend");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn query_agent(&self, query: AgentQuery) -> ClientResult<()> {
        debug!(session = %query.session_id, agent = ?query.explicit_agent, "POST agent query");
        let response = self
            .client
            .post(self.endpoint(&["agent", "query"]))
            .json(&query)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn health(&self) -> ClientResult<()> {
        let response = self
            .client
            .get(self.endpoint(&["health"]))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(self.health_timeout)
                } else {
                    ClientError::Network(e)
                }
            })?;
        Self::check(response).await?;
        Ok(())
    }
}
