//! HTTP implementation of [`ConfigTransport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::StatusCode;
use reqwest::Url;
use tracing::debug;
use tracing::trace;

use super::authorization_value;
use super::ConfigTransport;
use super::HmacSha1Signer;
use super::NamespaceRelease;
use super::NotificationEntry;
use super::PollResponse;
use super::Signer;
use crate::constants::AUTHORIZATION_HEADER;
use crate::constants::TIMESTAMP_HEADER;
use crate::time::timestamp_millis;
use crate::NetworkError;
use crate::PollConfig;
use crate::Result;
use crate::ServerConfig;

const FETCH_ENDPOINT: &str = "configs";
const POLL_ENDPOINT: &str = "notifications/v2";

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    cluster: String,
    ip: String,
    signer: Option<Box<dyn Signer>>,
    long_poll_timeout: Duration,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("cluster", &self.cluster)
            .field("ip", &self.ip)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

impl HttpTransport {
    /// Builds a transport for `server`, reporting `ip` as the client address.
    ///
    /// Requests are signed when `server.secret` is set.
    pub fn new(
        server: &ServerConfig,
        poll: &PollConfig,
        ip: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let signer: Option<Box<dyn Signer>> = if server.signing_enabled() {
            Some(Box::new(HmacSha1Signer::new(&server.secret)))
        } else {
            None
        };

        Ok(Self {
            client,
            base_url: server.base_url().to_string(),
            app_id: server.app_id.clone(),
            cluster: server.cluster.clone(),
            ip,
            signer,
            long_poll_timeout: poll.long_poll_timeout(),
            fetch_timeout: poll.fetch_timeout(),
        })
    }

    /// `{base}/configs/{appId}/{cluster}/{namespace}?releaseKey=&ip={ip}`
    pub(crate) fn configuration_url(
        &self,
        namespace: &str,
    ) -> Result<Url> {
        let raw = format!(
            "{}/{}/{}/{}/{}",
            self.base_url, FETCH_ENDPOINT, self.app_id, self.cluster, namespace
        );
        Url::parse_with_params(&raw, &[("releaseKey", ""), ("ip", self.ip.as_str())])
            .map_err(|e| NetworkError::InvalidUrl(format!("{raw}: {e}")).into())
    }

    /// `{base}/notifications/v2?appId=&cluster=&notifications=<json>`
    pub(crate) fn notifications_url(
        &self,
        notifications: &[NotificationEntry],
    ) -> Result<Url> {
        let payload = serde_json::to_string(notifications)?;
        let raw = format!("{}/{}", self.base_url, POLL_ENDPOINT);
        Url::parse_with_params(
            &raw,
            &[
                ("appId", self.app_id.as_str()),
                ("cluster", self.cluster.as_str()),
                ("notifications", payload.as_str()),
            ],
        )
        .map_err(|e| NetworkError::InvalidUrl(format!("{raw}: {e}")).into())
    }

    /// Signature headers for `url`; empty when signing is disabled
    pub(crate) fn signed_headers(
        &self,
        url: &Url,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let Some(signer) = &self.signer else {
            return Ok(headers);
        };

        let timestamp = timestamp_millis();
        let path_with_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let signature = signer.sign(&timestamp, &path_with_query);

        let authorization = authorization_value(&self.app_id, &signature);
        headers.insert(AUTHORIZATION_HEADER, header_value(&authorization)?);
        headers.insert(TIMESTAMP_HEADER, header_value(&timestamp)?);
        Ok(headers)
    }

    async fn get(
        &self,
        url: Url,
        timeout: Duration,
    ) -> Result<reqwest::Response> {
        let headers = self.signed_headers(&url)?;
        trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl ConfigTransport for HttpTransport {
    async fn fetch_configuration(
        &self,
        namespace: &str,
    ) -> Result<Option<NamespaceRelease>> {
        let url = self.configuration_url(namespace)?;
        let response = self.get(url, self.fetch_timeout).await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("fetch of namespace {} returned {}", namespace, status);
            return Ok(None);
        }

        let body = response.bytes().await?;
        let release: NamespaceRelease =
            serde_json::from_slice(&body).map_err(|e| NetworkError::MalformedResponse {
                endpoint: FETCH_ENDPOINT,
                reason: e.to_string(),
            })?;
        Ok(Some(release))
    }

    async fn poll_notifications(
        &self,
        notifications: Vec<NotificationEntry>,
    ) -> Result<PollResponse> {
        let url = self.notifications_url(&notifications)?;
        let response = self.get(url, self.long_poll_timeout).await?;

        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(PollResponse::NotModified),
            StatusCode::OK => {
                let body = response.bytes().await?;
                let changed: Vec<NotificationEntry> =
                    serde_json::from_slice(&body).map_err(|e| NetworkError::MalformedResponse {
                        endpoint: POLL_ENDPOINT,
                        reason: e.to_string(),
                    })?;
                Ok(PollResponse::Changed(changed))
            }
            other => Ok(PollResponse::Unexpected(other.as_u16())),
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| NetworkError::InvalidHeader(e.to_string()).into())
}
