//! Provider ids and role-checked construction.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use mirror_core::{ProviderError, ProviderResult, SourceProvider, TargetProvider};
use serde::{Deserialize, Serialize};

use crate::enterprise_gitee::{EnterpriseGitee, EnterpriseGiteeConfig};
use crate::gitee::{Gitee, GiteeConfig};
use crate::github::{GitHub, GitHubConfig};
use crate::gitlab::{GitLab, GitLabConfig};
use crate::local::Local;

/// Known hosting providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Github,
    Gitlab,
    Gitee,
    EGiteeV8,
    Local,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        Self::Github,
        Self::Gitlab,
        Self::Gitee,
        Self::EGiteeV8,
        Self::Local,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Gitee => "gitee",
            Self::EGiteeV8 => "e_gitee_v8",
            Self::Local => "local",
        }
    }

    pub fn can_be_source(self) -> bool {
        matches!(self, Self::Github | Self::EGiteeV8)
    }

    pub fn can_be_target(self) -> bool {
        !matches!(self, Self::EGiteeV8)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                ProviderError::Config(format!(
                    "unknown provider `{s}` (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

fn unsupported(kind: ProviderKind, role: &str) -> ProviderError {
    ProviderError::UnsupportedRole {
        provider: kind.to_string(),
        role: role.to_string(),
    }
}

/// Build the source provider `kind`, reading credentials through `lookup`.
pub fn build_source(
    kind: ProviderKind,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> ProviderResult<Arc<dyn SourceProvider>> {
    match kind {
        ProviderKind::Github => Ok(Arc::new(GitHub::new(GitHubConfig::from_vars(lookup)?)?)),
        ProviderKind::EGiteeV8 => Ok(Arc::new(EnterpriseGitee::new(
            EnterpriseGiteeConfig::from_vars(lookup)?,
        )?)),
        other => Err(unsupported(other, "source")),
    }
}

/// Build the target provider `kind`, reading credentials through `lookup`.
pub fn build_target(
    kind: ProviderKind,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> ProviderResult<Arc<dyn TargetProvider>> {
    match kind {
        ProviderKind::Github => Ok(Arc::new(GitHub::new(GitHubConfig::from_vars(lookup)?)?)),
        ProviderKind::Gitlab => Ok(Arc::new(GitLab::new(GitLabConfig::from_vars(lookup)?)?)),
        ProviderKind::Gitee => Ok(Arc::new(Gitee::new(GiteeConfig::from_vars(lookup)?)?)),
        ProviderKind::Local => Ok(Arc::new(Local)),
        other => Err(unsupported(other, "target")),
    }
}
