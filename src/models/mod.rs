pub mod conversation;
pub mod message;

pub use conversation::{
    AdminStats, Conversation, ConversationFilter, ConversationStatus, VisitorIdentity,
};
pub use message::{Message, SenderKind};
