pub mod assignment_service;
pub mod conversation_service;
pub mod directory;
pub mod message_service;
pub mod state_machine;

pub use assignment_service::AssignmentService;
pub use conversation_service::ConversationService;
pub use directory::AgentDirectory;
pub use message_service::MessageService;
pub use state_machine::{validate_transition, TransitionError};
