use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, SystemEvent};
use crate::models::{Conversation, ConversationStatus, Message};
use crate::services::assignment_service::AssignmentService;

/// Message flow for both audiences. Admin paths run the auto-assign claim
/// first and then check access against the post-claim state, closing the
/// race where two admins open the same waiting conversation at once.
#[derive(Clone)]
pub struct MessageService {
    db: Database,
    assignment: AssignmentService,
    event_bus: EventBus,
}

impl MessageService {
    pub fn new(db: Database, assignment: AssignmentService, event_bus: EventBus) -> Self {
        Self {
            db,
            assignment,
            event_bus,
        }
    }

    /// Visitor posts into their conversation. The first message moves a
    /// draft into the waiting queue; a message into a closed conversation
    /// still appends but never re-queues it.
    pub async fn send_visitor_message(
        &self,
        conversation_id: &str,
        body: String,
    ) -> EngineResult<Message> {
        Message::validate_body(&body).map_err(EngineError::InvalidInput)?;

        let conversation = self.get_required(conversation_id).await?;

        let message = Message::new_visitor(conversation_id.to_string(), &conversation.visitor(), body);
        let message = self.db.append_message(&message).await?;

        self.db.mark_waiting_on_first_message(conversation_id).await?;
        self.db.touch_activity(conversation_id).await?;

        self.event_bus.publish(SystemEvent::MessageAppended {
            message_id: message.id.clone(),
            conversation_id: conversation_id.to_string(),
            sender_kind: message.sender_kind,
            timestamp: message.created_at.clone(),
        });

        Ok(message)
    }

    /// Admin reply. Runs the auto-assign claim for waiting conversations,
    /// re-checks access from live state, and refuses closed conversations.
    pub async fn send_admin_message(
        &self,
        conversation_id: &str,
        admin_id: &str,
        body: String,
    ) -> EngineResult<Message> {
        Message::validate_body(&body).map_err(EngineError::InvalidInput)?;

        let conversation = self
            .assignment
            .claim_if_unowned(conversation_id, admin_id)
            .await?;

        if conversation.status == ConversationStatus::Closed {
            return Err(EngineError::PreconditionFailed(
                "Conversation is closed".to_string(),
            ));
        }

        if !AssignmentService::admin_can_access(&conversation, admin_id) {
            return Err(EngineError::AccessDenied {
                owner: conversation.owner_admin_id,
            });
        }

        let message =
            Message::new_admin(conversation_id.to_string(), admin_id.to_string(), body);
        let message = self.db.append_message(&message).await?;
        self.db.touch_activity(conversation_id).await?;

        self.event_bus.publish(SystemEvent::MessageAppended {
            message_id: message.id.clone(),
            conversation_id: conversation_id.to_string(),
            sender_kind: message.sender_kind,
            timestamp: message.created_at.clone(),
        });

        Ok(message)
    }

    /// Admin view of the log. Opening a waiting conversation claims it
    /// (auto-assign-on-access); whoever loses that race is denied here by
    /// the post-claim check. Side effect: visitor messages are marked
    /// read.
    pub async fn get_messages(
        &self,
        conversation_id: &str,
        admin_id: &str,
    ) -> EngineResult<Vec<Message>> {
        let conversation = self
            .assignment
            .claim_if_unowned(conversation_id, admin_id)
            .await?;

        if !AssignmentService::admin_can_access(&conversation, admin_id) {
            return Err(EngineError::AccessDenied {
                owner: conversation.owner_admin_id,
            });
        }

        self.db.mark_read_by_admin(conversation_id).await?;
        self.db.list_messages(conversation_id).await
    }

    /// Visitor view of the log; marks admin messages read.
    pub async fn get_messages_for_visitor(
        &self,
        conversation_id: &str,
    ) -> EngineResult<Vec<Message>> {
        self.get_required(conversation_id).await?;
        self.db.mark_read_by_visitor(conversation_id).await?;
        self.db.list_messages(conversation_id).await
    }

    pub async fn unread_count_for_admin(&self, admin_id: &str) -> EngineResult<i64> {
        self.db.unread_count_for_admin(admin_id).await
    }

    pub async fn unread_count_for_visitor(&self, conversation_id: &str) -> EngineResult<i64> {
        self.db.unread_count_for_visitor(conversation_id).await
    }

    async fn get_required(&self, conversation_id: &str) -> EngineResult<Conversation> {
        self.db
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("Conversation {} not found", conversation_id))
            })
    }
}
