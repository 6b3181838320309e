use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, SystemEvent};
use crate::models::{
    AdminStats, Conversation, ConversationFilter, ConversationStatus, Message, VisitorIdentity,
};
use crate::services::directory::AgentDirectory;
use crate::services::state_machine::validate_transition;
use std::sync::Arc;

/// Lifecycle workflow: creation, transfer, close, reopen, delete, plus the
/// dashboard queries. Every mutation re-validates against the live row
/// inside the store's conditional update; checks done here first only
/// sharpen the error a caller gets.
#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    directory: Arc<dyn AgentDirectory>,
    event_bus: EventBus,
}

impl ConversationService {
    pub fn new(db: Database, directory: Arc<dyn AgentDirectory>, event_bus: EventBus) -> Self {
        Self {
            db,
            directory,
            event_bus,
        }
    }

    /// Visitor opened the chat widget; conversation starts in `draft` and
    /// only enters the waiting queue on the first message.
    pub async fn start_conversation(
        &self,
        visitor: VisitorIdentity,
    ) -> EngineResult<Conversation> {
        if let VisitorIdentity::Guest { name, .. } = &visitor {
            if name.trim().is_empty() {
                return Err(EngineError::InvalidInput(
                    "Guest visitors must provide a name".to_string(),
                ));
            }
        }

        self.db.create_conversation(&visitor).await
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> EngineResult<Conversation> {
        self.db
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("Conversation {} not found", conversation_id))
            })
    }

    /// Hand the conversation to another agent. `from_admin` must be the
    /// live owner (Unauthorized otherwise, regardless of the target), and
    /// `to_admin` must hold agent capability (InvalidTarget).
    pub async fn transfer(
        &self,
        conversation_id: &str,
        from_admin: &str,
        to_admin: &str,
    ) -> EngineResult<Conversation> {
        let conversation = self.get_conversation(conversation_id).await?;

        if !conversation.is_owned_by(from_admin) {
            return Err(EngineError::Unauthorized);
        }

        if !self.directory.has_agent_capability(to_admin).await? {
            return Err(EngineError::InvalidTarget);
        }

        // The conditional update is the authority; a concurrent transfer or
        // close between the check above and here surfaces as a failure.
        let transferred = self
            .db
            .transfer_owner(conversation_id, from_admin, to_admin)
            .await?;
        if !transferred {
            return Err(EngineError::Unauthorized);
        }

        let name = self
            .directory
            .display_name(to_admin)
            .await?
            .unwrap_or_else(|| to_admin.to_string());
        let notice = Message::new_system(
            conversation_id.to_string(),
            from_admin.to_string(),
            format!("Conversation transferred to {}.", name),
        );
        self.db.append_message(&notice).await?;
        self.db.touch_activity(conversation_id).await?;

        tracing::info!(
            "Conversation {} transferred from {} to {}",
            conversation_id,
            from_admin,
            to_admin
        );

        self.event_bus.publish(SystemEvent::ConversationTransferred {
            conversation_id: conversation_id.to_string(),
            from_admin_id: from_admin.to_string(),
            to_admin_id: to_admin.to_string(),
            timestamp: notice.created_at.clone(),
        });

        self.get_conversation(conversation_id).await
    }

    /// Close by the owning admin. Returns false for a repeat close (no-op,
    /// state untouched); errors with Unauthorized when someone else owns
    /// the conversation.
    pub async fn close(
        &self,
        conversation_id: &str,
        by_admin: &str,
        reason: Option<&str>,
    ) -> EngineResult<bool> {
        let conversation = self.get_conversation(conversation_id).await?;

        if conversation.status == ConversationStatus::Closed {
            return Ok(false);
        }

        if !conversation.is_owned_by(by_admin) {
            return Err(EngineError::Unauthorized);
        }

        validate_transition(conversation.status, ConversationStatus::Closed)
            .map_err(|e| EngineError::PreconditionFailed(e.to_string()))?;

        let closed = self.db.close_conversation(conversation_id, by_admin).await?;
        if !closed {
            // Raced with another close or transfer; report as no-op
            return Ok(false);
        }

        let body = match reason {
            Some(reason) => format!("Conversation closed: {}", reason),
            None => "Conversation closed.".to_string(),
        };
        let notice = Message::new_system(
            conversation_id.to_string(),
            by_admin.to_string(),
            body,
        );
        self.db.append_message(&notice).await?;

        tracing::info!("Conversation {} closed by admin {}", conversation_id, by_admin);

        self.event_bus.publish(SystemEvent::ConversationClosed {
            conversation_id: conversation_id.to_string(),
            admin_id: by_admin.to_string(),
            timestamp: notice.created_at.clone(),
        });

        Ok(true)
    }

    /// Reopen by reassignment: the only way back from `closed`. The new
    /// owner need not be the admin who closed it.
    pub async fn reopen(
        &self,
        conversation_id: &str,
        admin_id: &str,
    ) -> EngineResult<Conversation> {
        let conversation = self.get_conversation(conversation_id).await?;

        if conversation.status != ConversationStatus::Closed {
            return Err(EngineError::PreconditionFailed(
                "Only closed conversations can be reopened".to_string(),
            ));
        }

        if !self.directory.has_agent_capability(admin_id).await? {
            return Err(EngineError::InvalidTarget);
        }

        let reopened = self.db.reopen_conversation(conversation_id, admin_id).await?;
        if !reopened {
            return Err(EngineError::PreconditionFailed(
                "Conversation is no longer closed".to_string(),
            ));
        }

        let name = self
            .directory
            .display_name(admin_id)
            .await?
            .unwrap_or_else(|| admin_id.to_string());
        let notice = Message::new_system(
            conversation_id.to_string(),
            admin_id.to_string(),
            format!("Conversation reopened by {}.", name),
        );
        self.db.append_message(&notice).await?;

        self.event_bus.publish(SystemEvent::ConversationReopened {
            conversation_id: conversation_id.to_string(),
            admin_id: admin_id.to_string(),
            timestamp: notice.created_at.clone(),
        });

        self.get_conversation(conversation_id).await
    }

    /// Irreversible: drops the conversation and every message. Only the
    /// owner of a closed conversation may do this; callers confirm
    /// out-of-band.
    pub async fn delete(&self, conversation_id: &str, by_admin: &str) -> EngineResult<()> {
        let conversation = self.get_conversation(conversation_id).await?;

        if conversation.status != ConversationStatus::Closed {
            return Err(EngineError::PreconditionFailed(
                "Only closed conversations can be deleted".to_string(),
            ));
        }

        if !conversation.is_owned_by(by_admin) {
            return Err(EngineError::Unauthorized);
        }

        let deleted = self.db.delete_conversation(conversation_id, by_admin).await?;
        if !deleted {
            return Err(EngineError::PreconditionFailed(
                "Conversation changed before it could be deleted".to_string(),
            ));
        }

        self.event_bus.publish(SystemEvent::ConversationDeleted {
            conversation_id: conversation_id.to_string(),
            admin_id: by_admin.to_string(),
            timestamp: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap(),
        });

        Ok(())
    }

    pub async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> EngineResult<Vec<Conversation>> {
        self.db.list_conversations(filter).await
    }

    /// Dashboard counters, all derived by aggregate queries on demand.
    pub async fn stats_for(&self, admin_id: &str) -> EngineResult<AdminStats> {
        Ok(AdminStats {
            waiting: self.db.count_waiting().await?,
            active: self.db.count_active_for(admin_id).await?,
            closed_today: self.db.count_closed_today_for(admin_id).await?,
            unread: self.db.unread_count_for_admin(admin_id).await?,
        })
    }
}
