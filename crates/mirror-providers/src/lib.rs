//! Mirror Providers
//!
//! Concrete [`mirror_core::SourceProvider`] and [`mirror_core::TargetProvider`]
//! implementations for GitHub, GitLab, Gitee and Gitee Enterprise, plus the
//! `local` sink and the id registry the CLI builds providers from.

pub mod config;
pub mod enterprise_gitee;
pub mod error;
pub mod gitee;
pub mod github;
pub mod gitlab;
pub mod local;
pub mod registry;

pub use config::{env_lookup, Secret};
pub use enterprise_gitee::{EnterpriseGitee, EnterpriseGiteeConfig};
pub use error::ApiError;
pub use gitee::{Gitee, GiteeConfig};
pub use github::{GitHub, GitHubConfig};
pub use gitlab::{GitLab, GitLabConfig};
pub use local::Local;
pub use registry::{build_source, build_target, ProviderKind};
