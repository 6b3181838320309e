use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, SystemEvent};
use crate::models::{Conversation, ConversationStatus, Message};
use crate::services::directory::AgentDirectory;
use std::sync::Arc;

/// Serializes the two admission paths into ownership: the explicit "take"
/// click and the implicit claim when an admin opens or replies to a
/// waiting conversation. Both ride the registry's compare-and-assign, so
/// exactly one admin wins per conversation no matter how many console
/// tabs race.
#[derive(Clone)]
pub struct AssignmentService {
    db: Database,
    directory: Arc<dyn AgentDirectory>,
    event_bus: EventBus,
}

impl AssignmentService {
    pub fn new(db: Database, directory: Arc<dyn AgentDirectory>, event_bus: EventBus) -> Self {
        Self {
            db,
            directory,
            event_bus,
        }
    }

    /// Explicit take. On success a system greeting is appended and
    /// `ConversationAssigned` published. Losing the race yields
    /// `Conflict` carrying the current owner — expected under concurrent
    /// consoles, logged at debug only.
    pub async fn take_conversation(
        &self,
        conversation_id: &str,
        admin_id: &str,
    ) -> EngineResult<Conversation> {
        let conversation = self
            .db
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("Conversation {} not found", conversation_id))
            })?;

        // Re-take by the current owner is idempotent
        if conversation.is_owned_by(admin_id) {
            tracing::debug!(
                "Conversation {} already taken by admin {} (idempotent request)",
                conversation_id,
                admin_id
            );
            return Ok(conversation);
        }

        let (conversation, won) = self.db.compare_and_assign(conversation_id, admin_id).await?;

        if !won {
            return Err(EngineError::Conflict {
                owner: conversation.owner_admin_id,
            });
        }

        let name = self.admin_label(admin_id).await?;
        let greeting = Message::new_system(
            conversation_id.to_string(),
            admin_id.to_string(),
            format!("Hello, I'm {}. How can I help you?", name),
        );
        self.db.append_message(&greeting).await?;

        self.event_bus.publish(SystemEvent::ConversationAssigned {
            conversation_id: conversation_id.to_string(),
            admin_id: admin_id.to_string(),
            timestamp: greeting.created_at.clone(),
        });

        Ok(conversation)
    }

    /// Auto-assign-on-access. When the conversation is still claimable the
    /// same compare-and-assign runs; the result is the live post-race
    /// state, which the caller must use for its access check — never a
    /// snapshot taken before the claim.
    pub async fn claim_if_unowned(
        &self,
        conversation_id: &str,
        admin_id: &str,
    ) -> EngineResult<Conversation> {
        let conversation = self
            .db
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("Conversation {} not found", conversation_id))
            })?;

        let claimable = conversation.status == ConversationStatus::Waiting
            || (conversation.owner_admin_id.is_none()
                && conversation.status == ConversationStatus::Active);

        if !claimable {
            return Ok(conversation);
        }

        let (conversation, won) = self.db.compare_and_assign(conversation_id, admin_id).await?;

        if won {
            self.event_bus.publish(SystemEvent::ConversationAssigned {
                conversation_id: conversation_id.to_string(),
                admin_id: admin_id.to_string(),
                timestamp: conversation.updated_at.clone(),
            });
        }

        // Losing here is not an error; the caller's access check against
        // this state decides what the admin may do next.
        Ok(conversation)
    }

    /// Pure access rule over current state. Owner always passes; anyone
    /// may approach a waiting conversation (the claim routes through
    /// compare-and-assign first); an active conversation with no owner is
    /// tolerated for data predating the ownership invariant.
    pub fn admin_can_access(conversation: &Conversation, admin_id: &str) -> bool {
        conversation.is_owned_by(admin_id)
            || conversation.status == ConversationStatus::Waiting
            || (conversation.status == ConversationStatus::Active
                && conversation.owner_admin_id.is_none())
    }

    async fn admin_label(&self, admin_id: &str) -> EngineResult<String> {
        Ok(self
            .directory
            .display_name(admin_id)
            .await?
            .unwrap_or_else(|| admin_id.to_string()))
    }
}
