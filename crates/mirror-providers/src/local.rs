//! Local-copy sink: repositories are cloned as working copies and kept on
//! disk. Nothing is created or pushed anywhere.

use async_trait::async_trait;
use mirror_core::{MirrorMode, ProviderResult, RetentionPolicy, TargetProvider};

#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

#[async_trait]
impl TargetProvider for Local {
    fn identifier(&self) -> &str {
        "local"
    }

    fn mirror_mode(&self) -> MirrorMode {
        MirrorMode::WorkingCopy
    }

    fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::Keep
    }

    async fn repo_exists(&self, _name: &str) -> ProviderResult<bool> {
        Ok(true)
    }

    async fn create_repo(
        &self,
        _name: &str,
        _description: &str,
        _private: bool,
    ) -> ProviderResult<()> {
        Ok(())
    }

    fn push_address(&self, _name: &str) -> Option<String> {
        None
    }
}
