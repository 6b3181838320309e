pub mod test_db;

use async_trait::async_trait;
use livedesk::{
    AgentDirectory, AssignmentService, ConversationService, Database, EngineResult, EventBus,
    MessageService, VisitorIdentity,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed roster standing in for the platform's identity system.
pub struct StaticDirectory {
    names: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new(agents: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            names: agents
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl AgentDirectory for StaticDirectory {
    async fn has_agent_capability(&self, user_id: &str) -> EngineResult<bool> {
        Ok(self.names.contains_key(user_id))
    }

    async fn display_name(&self, user_id: &str) -> EngineResult<Option<String>> {
        Ok(self.names.get(user_id).cloned())
    }
}

pub struct TestEngine {
    pub db: Database,
    pub events: EventBus,
    pub assignment: AssignmentService,
    pub conversations: ConversationService,
    pub messages: MessageService,
}

/// Engine wired against a fresh database and three known agents.
pub async fn setup_engine() -> TestEngine {
    let db = test_db::setup_test_db().await;
    let events = EventBus::new(100);
    let directory = StaticDirectory::new(&[
        ("admin-1", "Alice"),
        ("admin-2", "Bob"),
        ("admin-3", "Cara"),
    ]);

    let assignment = AssignmentService::new(db.clone(), directory.clone(), events.clone());
    let conversations = ConversationService::new(db.clone(), directory.clone(), events.clone());
    let messages = MessageService::new(db.clone(), assignment.clone(), events.clone());

    TestEngine {
        db,
        events,
        assignment,
        conversations,
        messages,
    }
}

pub fn guest(name: &str) -> VisitorIdentity {
    VisitorIdentity::Guest {
        name: name.to_string(),
        email: None,
    }
}

pub fn registered(user_id: &str) -> VisitorIdentity {
    VisitorIdentity::Registered {
        user_id: user_id.to_string(),
    }
}

/// Conversation already in the waiting queue: created, one visitor message.
pub async fn waiting_conversation(engine: &TestEngine) -> String {
    let conversation = engine
        .conversations
        .start_conversation(guest("Visitor"))
        .await
        .unwrap();
    engine
        .messages
        .send_visitor_message(&conversation.id, "I need help".to_string())
        .await
        .unwrap();
    conversation.id
}

/// Conversation owned by the given admin after an explicit take.
pub async fn active_conversation(engine: &TestEngine, admin_id: &str) -> String {
    let id = waiting_conversation(engine).await;
    engine
        .assignment
        .take_conversation(&id, admin_id)
        .await
        .unwrap();
    id
}
