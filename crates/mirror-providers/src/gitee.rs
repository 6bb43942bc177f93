//! Gitee target client (API v5)

use async_trait::async_trait;
use mirror_core::{ProviderResult, TargetProvider};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::{self, Secret};
use crate::error::Result;

const DEFAULT_API_BASE: &str = "https://gitee.com/api/v5";
const DEFAULT_GIT_HOST: &str = "gitee.com";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_git_host() -> String {
    DEFAULT_GIT_HOST.to_string()
}

/// Gitee account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteeConfig {
    pub username: String,
    pub access_token: Secret,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_git_host")]
    pub git_host: String,
}

impl GiteeConfig {
    pub fn from_vars(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            username: config::required(lookup, "GITEE_USERNAME")?,
            access_token: Secret::new(config::required(lookup, "GITEE_ACCESS_TOKEN")?),
            api_base: config::or_default(lookup, "GITEE_API_BASE", DEFAULT_API_BASE),
            git_host: default_git_host(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(&config::env_lookup)
    }
}

/// v5 takes the token in the request body as well as the header.
#[derive(Debug, Serialize)]
struct CreateRepo<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    access_token: &'a str,
}

/// Gitee REST client
pub struct Gitee {
    config: GiteeConfig,
    api_base: String,
    http: reqwest::Client,
}

impl Gitee {
    pub fn new(config: GiteeConfig) -> Result<Self> {
        Ok(Self {
            api_base: config::trim_base(&config.api_base),
            http: config::http_client()?,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GiteeConfig::from_env()?)
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let url = format!("{}/repos/{}/{}", self.api_base, self.config.username, name);
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.config.access_token.expose())
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(config::status_error(resp).await),
        }
    }

    pub async fn create(&self, name: &str, description: &str, private: bool) -> Result<()> {
        let body = CreateRepo {
            name,
            description,
            private,
            access_token: self.config.access_token.expose(),
        };
        let resp = self
            .http
            .post(format!("{}/user/repos", self.api_base))
            .bearer_auth(self.config.access_token.expose())
            .json(&body)
            .send()
            .await?;
        config::expect_status(resp, StatusCode::CREATED).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetProvider for Gitee {
    fn identifier(&self) -> &str {
        "gitee"
    }

    async fn repo_exists(&self, name: &str) -> ProviderResult<bool> {
        Ok(self.exists(name).await?)
    }

    async fn create_repo(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> ProviderResult<()> {
        Ok(self.create(name, description, private).await?)
    }

    fn push_address(&self, name: &str) -> Option<String> {
        Some(config::credential_url(
            &self.config.git_host,
            &self.config.username,
            &self.config.access_token,
            &format!("{}/{}", self.config.username, name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::lookup_from;

    #[test]
    fn test_config_defaults_and_override() {
        let lookup = lookup_from(&[("GITEE_USERNAME", "li"), ("GITEE_ACCESS_TOKEN", "t")]);
        let cfg = GiteeConfig::from_vars(&lookup).unwrap();
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);

        let lookup = lookup_from(&[
            ("GITEE_USERNAME", "li"),
            ("GITEE_ACCESS_TOKEN", "t"),
            ("GITEE_API_BASE", "http://127.0.0.1:8080/api/v5"),
        ]);
        let cfg = GiteeConfig::from_vars(&lookup).unwrap();
        assert_eq!(cfg.api_base, "http://127.0.0.1:8080/api/v5");
    }

    #[test]
    fn test_create_body_carries_token() {
        let body = serde_json::to_value(CreateRepo {
            name: "api",
            description: "",
            private: true,
            access_token: "t",
        })
        .unwrap();
        assert_eq!(body["access_token"], "t");
        assert_eq!(body["private"], true);
    }

    #[test]
    fn test_push_address() {
        let gitee = Gitee::new(GiteeConfig {
            username: "li".into(),
            access_token: Secret::new("t"),
            api_base: default_api_base(),
            git_host: default_git_host(),
        })
        .unwrap();
        assert_eq!(
            gitee.push_address("api").as_deref(),
            Some("https://li:t@gitee.com/li/api.git")
        );
    }
}
