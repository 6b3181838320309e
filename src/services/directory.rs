use crate::error::EngineResult;
use async_trait::async_trait;

/// Port to the platform's identity system. The engine references admins by
/// id only; resolving who is logged in happens upstream, and every public
/// operation takes an explicit `admin_id`.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Whether the user may act as a support agent (claim, receive
    /// transfers).
    async fn has_agent_capability(&self, user_id: &str) -> EngineResult<bool>;

    /// Human-readable name for system messages; None falls back to the id.
    async fn display_name(&self, user_id: &str) -> EngineResult<Option<String>>;
}
