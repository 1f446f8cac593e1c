use std::time::Duration;

use log::debug;
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::models::{
    Conversation, Message, RenameRequest, StartRequest, StartResponse, TripPlanRequest,
    TripPlanResponse,
};
use crate::error::ClientError;

/// Thin wrapper over the Tripper backend's HTTP surface. Every call is a single
/// request/response; nothing here retries.
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub http: HttpClient,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn check(resp: Response) -> Result<Response, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                endpoint: resp.url().to_string(),
            });
        }
        Ok(resp)
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
        let resp = Self::check(resp)?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Begin (or resume) a conversation for the user. Returns its id.
    pub async fn start_conversation(&self, user_id: &str) -> Result<i64, ClientError> {
        let url = self.endpoint(&["chat", "start"])?;
        debug!("POST {url}");
        let resp = self
            .http
            .post(url)
            .json(&StartRequest { user_id })
            .send()
            .await?;
        let started: StartResponse = Self::read_json(resp).await?;
        Ok(started.conversation_id)
    }

    pub async fn history(
        &self,
        user_id: &str,
        conversation_id: i64,
    ) -> Result<Vec<Message>, ClientError> {
        let mut url = self.endpoint(&["chat", "history"])?;
        url.query_pairs_mut()
            .append_pair("userId", user_id)
            .append_pair("conversationId", &conversation_id.to_string());
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::read_json(resp).await
    }

    pub async fn conversations(&self, email: &str) -> Result<Vec<Conversation>, ClientError> {
        let url = self.endpoint(&["chat", "user", email])?;
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::read_json(resp).await
    }

    pub async fn conversation_messages(&self, id: i64) -> Result<Vec<Message>, ClientError> {
        let url = self.endpoint(&["chat", &id.to_string(), "messages"])?;
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::read_json(resp).await
    }

    pub async fn rename_conversation(&self, id: i64, title: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["chat", &id.to_string(), "title"])?;
        debug!("PATCH {url}");
        let resp = self
            .http
            .patch(url)
            .json(&RenameRequest { title })
            .send()
            .await?;
        Self::check(resp)?;
        Ok(())
    }

    pub async fn delete_conversation(&self, id: i64) -> Result<(), ClientError> {
        let url = self.endpoint(&["chat", &id.to_string()])?;
        debug!("DELETE {url}");
        let resp = self.http.delete(url).send().await?;
        Self::check(resp)?;
        Ok(())
    }

    /// Rendered PDF of the conversation, as raw bytes.
    pub async fn export_pdf(&self, id: i64) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint(&["chat", &id.to_string(), "export", "pdf"])?;
        debug!("GET {url}");
        let resp = Self::check(self.http.get(url).send().await?)?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn trip_plan(&self, request: &TripPlanRequest) -> Result<TripPlanResponse, ClientError> {
        let url = self.endpoint(&["trip-plan"])?;
        debug!("POST {url}");
        let resp = self.http.post(url).json(request).send().await?;
        Self::read_json(resp).await
    }

    pub async fn download_file(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint(&["files", "download", name])?;
        debug!("GET {url}");
        let resp = Self::check(self.http.get(url).send().await?)?;
        Ok(resp.bytes().await?.to_vec())
    }
}
