//! REST client for Qumulo clusters

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::ClusterSettings;
use crate::error::{Error, Result};
use crate::models::{FsUsage, QuotaUsage, Relationship};

use super::MetricSource;

const LOGIN_PATH: &str = "v1/session/login";
const FS_PATH: &str = "v1/file-system";
const QUOTAS_PATH: &str = "v1/files/quotas/status/";
const SOURCE_RELATIONSHIPS_PATH: &str = "v2/replication/source-relationships/status/";
const TARGET_RELATIONSHIPS_PATH: &str = "v2/replication/target-relationships/status/";

/// Authenticated client for the cluster's REST API
pub struct QumuloClient {
    client: Client,
    base: Url,
    token: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    bearer_token: String,
}

#[derive(Deserialize)]
struct FsStats {
    total_size_bytes: ByteCount,
    free_size_bytes: ByteCount,
}

#[derive(Deserialize)]
struct QuotaPage {
    quotas: Vec<QuotaStatus>,
    #[serde(default)]
    paging: Paging,
}

#[derive(Deserialize, Default)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct QuotaStatus {
    path: String,
    limit: ByteCount,
    capacity_usage: ByteCount,
}

/// Byte counts are sent as decimal strings, but accept plain numbers too
#[derive(Deserialize)]
#[serde(untagged)]
enum ByteCount {
    Text(String),
    Number(u64),
}

impl ByteCount {
    fn parse(&self, field: &str) -> Result<u64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| Error::source(format!("Invalid {field} \"{s}\": {e}"))),
        }
    }
}

impl QumuloClient {
    /// Log in to the cluster described by `settings`
    pub async fn login(settings: &ClusterSettings) -> Result<Self> {
        let base = Url::parse(&format!(
            "https://{}:{}/",
            settings.cluster_address, settings.rest_port
        ))
        .map_err(|e| Error::config(format!("Invalid cluster address: {e}")))?;

        Self::login_at(
            base,
            &settings.username,
            &settings.password,
            settings.verify_certificate,
        )
        .await
    }

    /// Log in against an explicit API base URL
    pub async fn login_at(
        base: Url,
        username: &str,
        password: &str,
        verify_certificate: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .danger_accept_invalid_certs(!verify_certificate)
            .build()?;

        let url = join(&base, LOGIN_PATH)?;
        let response = client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::source(format!(
                "Login to {} rejected for user \"{username}\"",
                base.host_str().unwrap_or_default()
            )));
        }

        let login: LoginResponse = response.error_for_status()?.json().await?;
        debug!(host = %base.host_str().unwrap_or_default(), "Logged in to cluster");

        Ok(Self {
            client,
            base,
            token: login.bearer_token,
        })
    }

    /// Host the client talks to
    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "GET");
        let value = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::source(format!("Invalid API path {path}: {e}")))
}

#[async_trait]
impl MetricSource for QumuloClient {
    async fn fs_usage(&self) -> Result<FsUsage> {
        let stats: FsStats = self.get(join(&self.base, FS_PATH)?).await?;
        Ok(FsUsage {
            total_bytes: stats.total_size_bytes.parse("total_size_bytes")?,
            free_bytes: stats.free_size_bytes.parse("free_size_bytes")?,
        })
    }

    async fn quota_usages(&self) -> Result<Vec<QuotaUsage>> {
        let mut quotas = Vec::new();
        let mut next = Some(join(&self.base, QUOTAS_PATH)?);

        while let Some(url) = next.take() {
            let page: QuotaPage = self.get(url.clone()).await?;

            for quota in page.quotas {
                quotas.push(QuotaUsage {
                    used_bytes: quota.capacity_usage.parse("capacity_usage")?,
                    limit_bytes: quota.limit.parse("limit")?,
                    path: quota.path,
                });
            }

            next = match page.paging.next.as_deref().map(str::trim) {
                Some(link) if !link.is_empty() => {
                    let link = join(&self.base, link.trim_start_matches('/'))?;
                    (link != url).then_some(link)
                }
                _ => None,
            };
        }

        debug!(count = quotas.len(), "Fetched quotas");
        Ok(quotas)
    }

    async fn source_relationships(&self) -> Result<Vec<Relationship>> {
        self.get(join(&self.base, SOURCE_RELATIONSHIPS_PATH)?).await
    }

    async fn target_relationships(&self) -> Result<Vec<Relationship>> {
        self.get(join(&self.base, TARGET_RELATIONSHIPS_PATH)?).await
    }
}
