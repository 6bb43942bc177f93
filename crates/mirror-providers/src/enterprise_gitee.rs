//! Gitee Enterprise (API v8) source client.
//!
//! Lists every project of one enterprise. The v8 API wraps each page in a
//! `data` field and only exposes enterprise-internal projects, so every
//! listed repository is treated as private.

use async_trait::async_trait;
use mirror_core::{ProviderResult, RepositoryDescriptor, SourceProvider};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{self, Secret};
use crate::error::{ApiError, Result};

const DEFAULT_API_BASE: &str = "https://api.gitee.com";
const DEFAULT_GIT_HOST: &str = "gitee.com";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_git_host() -> String {
    DEFAULT_GIT_HOST.to_string()
}

/// Enterprise account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterpriseGiteeConfig {
    pub enterprise_id: String,
    pub username: String,
    pub access_token: Secret,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_git_host")]
    pub git_host: String,
}

impl EnterpriseGiteeConfig {
    pub fn from_vars(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            enterprise_id: config::required(lookup, "E_GITEE_V8_ENTERPRISE_ID")?,
            username: config::required(lookup, "E_GITEE_V8_USERNAME")?,
            access_token: Secret::new(config::required(lookup, "E_GITEE_V8_ACCESS_TOKEN")?),
            api_base: config::or_default(lookup, "E_GITEE_V8_API_BASE", DEFAULT_API_BASE),
            git_host: default_git_host(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(&config::env_lookup)
    }
}

#[derive(Debug, Deserialize)]
struct ProjectsPage {
    #[serde(default)]
    data: Option<Vec<Project>>,
}

#[derive(Debug, Deserialize)]
struct Project {
    path: String,
    path_with_namespace: String,
    #[serde(default)]
    description: Option<String>,
}

/// Enterprise Gitee v8 client
pub struct EnterpriseGitee {
    config: EnterpriseGiteeConfig,
    api_base: String,
    http: reqwest::Client,
}

impl EnterpriseGitee {
    pub fn new(config: EnterpriseGiteeConfig) -> Result<Self> {
        Ok(Self {
            api_base: config::trim_base(&config.api_base),
            http: config::http_client()?,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EnterpriseGiteeConfig::from_env()?)
    }

    async fn list_page(&self, page: usize) -> Result<Vec<Project>> {
        let url = format!(
            "{}/enterprises/{}/projects",
            self.api_base, self.config.enterprise_id
        );
        let resp = self
            .http
            .get(url)
            .header("Content-Type", "application/json;charset=UTF-8")
            .query(&[
                ("access_token", self.config.access_token.expose().to_string()),
                ("per_page", config::PER_PAGE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;
        let resp = config::expect_status(resp, StatusCode::OK).await?;
        let body = resp.text().await?;
        parse_page(&body)
    }

    pub async fn list_all(&self) -> Result<Vec<RepositoryDescriptor>> {
        let mut repos = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_page(page).await?;
            let last = config::is_last_page(batch.len());
            debug!(page, count = batch.len(), "enterprise projects page");
            repos.extend(batch.into_iter().filter_map(descriptor_from));
            if last {
                break;
            }
            page += 1;
        }
        Ok(repos)
    }
}

fn parse_page(body: &str) -> Result<Vec<Project>> {
    let page: ProjectsPage = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "unmarshal enterprise projects failed");
        ApiError::Json(e)
    })?;
    let Some(projects) = page.data else {
        error!("response data not exists");
        return Err(ApiError::MissingField("data"));
    };
    Ok(projects)
}

fn descriptor_from(p: Project) -> Option<RepositoryDescriptor> {
    RepositoryDescriptor::new(
        p.path,
        p.path_with_namespace,
        p.description.unwrap_or_default(),
        true,
    )
    .map_err(|e| warn!(error = %e, "skipping enterprise project"))
    .ok()
}

#[async_trait]
impl SourceProvider for EnterpriseGitee {
    fn identifier(&self) -> &str {
        "e_gitee_v8"
    }

    async fn list_repos(&self) -> ProviderResult<Vec<RepositoryDescriptor>> {
        Ok(self.list_all().await?)
    }

    fn clone_address(&self, repo: &RepositoryDescriptor) -> String {
        config::credential_url(
            &self.config.git_host,
            &self.config.username,
            &self.config.access_token,
            repo.path_with_namespace(),
        )
    }
}
