use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::VisitorIdentity;

/// Closed set of message author kinds. Unread tracking and access rules
/// branch on this exhaustively; "system" is not a kind of its own — engine
/// generated lifecycle records carry the acting admin as author with
/// `is_system` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    User,
    Guest,
    Admin,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::User => "user",
            SenderKind::Guest => "guest",
            SenderKind::Admin => "admin",
        }
    }

    /// Messages the admin side has to read (visitor-authored).
    pub fn is_visitor(&self) -> bool {
        match self {
            SenderKind::User | SenderKind::Guest => true,
            SenderKind::Admin => false,
        }
    }
}

impl From<String> for SenderKind {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => SenderKind::Admin,
            "guest" => SenderKind::Guest,
            _ => SenderKind::User,
        }
    }
}

impl std::fmt::Display for SenderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl sqlx::Type<sqlx::Any> for SenderKind {
    fn type_info() -> sqlx::any::AnyTypeInfo {
        <String as sqlx::Type<sqlx::Any>>::type_info()
    }

    fn compatible(ty: &sqlx::any::AnyTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Any>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Any> for SenderKind {
    fn decode(value: sqlx::any::AnyValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Any>>::decode(value)?;
        Ok(SenderKind::from(s))
    }
}

/// One entry in a conversation's append-only log. Immutable once created,
/// except the `is_read`/`read_at` pair which only moves false→true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Store-assigned monotonic sequence; tiebreak for equal timestamps.
    pub seq: i64,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub sender_kind: SenderKind,
    pub is_system: bool,
    pub body: String,
    pub is_read: bool,
    pub read_at: Option<String>, // ISO 8601 timestamp
    pub created_at: String,      // ISO 8601 timestamp
}

impl Message {
    fn new(
        conversation_id: String,
        sender_id: Option<String>,
        sender_kind: SenderKind,
        is_system: bool,
        body: String,
    ) -> Self {
        let now = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap();

        Self {
            id: Uuid::new_v4().to_string(),
            seq: 0, // assigned by the store on append
            conversation_id,
            sender_id,
            sender_kind,
            is_system,
            body,
            is_read: false,
            read_at: None,
            created_at: now,
        }
    }

    /// Message posted through the chat widget by the visitor.
    pub fn new_visitor(conversation_id: String, visitor: &VisitorIdentity, body: String) -> Self {
        match visitor {
            VisitorIdentity::Registered { user_id } => Self::new(
                conversation_id,
                Some(user_id.clone()),
                SenderKind::User,
                false,
                body,
            ),
            VisitorIdentity::Guest { .. } => {
                Self::new(conversation_id, None, SenderKind::Guest, false, body)
            }
        }
    }

    /// Reply typed by an admin agent.
    pub fn new_admin(conversation_id: String, admin_id: String, body: String) -> Self {
        Self::new(conversation_id, Some(admin_id), SenderKind::Admin, false, body)
    }

    /// Engine-generated lifecycle record (take, transfer, close), attributed
    /// to the acting admin.
    pub fn new_system(conversation_id: String, admin_id: String, body: String) -> Self {
        Self::new(conversation_id, Some(admin_id), SenderKind::Admin, true, body)
    }

    pub fn validate_body(body: &str) -> Result<(), String> {
        let len = body.len();
        if body.trim().is_empty() {
            return Err("Message body cannot be empty".to_string());
        }
        if len > 10_000 {
            return Err(format!(
                "Message body too long: {} characters (max 10,000)",
                len
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_kind_serialization() {
        assert_eq!(SenderKind::User.as_str(), "user");
        assert_eq!(SenderKind::Guest.as_str(), "guest");
        assert_eq!(SenderKind::Admin.as_str(), "admin");
    }

    #[test]
    fn test_sender_kind_visitor_split() {
        assert!(SenderKind::User.is_visitor());
        assert!(SenderKind::Guest.is_visitor());
        assert!(!SenderKind::Admin.is_visitor());
    }

    #[test]
    fn test_new_visitor_message_guest() {
        let visitor = VisitorIdentity::Guest {
            name: "Ann".to_string(),
            email: None,
        };
        let msg = Message::new_visitor("conv_123".to_string(), &visitor, "Hello".to_string());

        assert_eq!(msg.sender_kind, SenderKind::Guest);
        assert!(msg.sender_id.is_none());
        assert!(!msg.is_system);
        assert!(!msg.is_read);
        assert!(msg.read_at.is_none());
    }

    #[test]
    fn test_new_visitor_message_registered() {
        let visitor = VisitorIdentity::Registered {
            user_id: "user_456".to_string(),
        };
        let msg = Message::new_visitor("conv_123".to_string(), &visitor, "Hi".to_string());

        assert_eq!(msg.sender_kind, SenderKind::User);
        assert_eq!(msg.sender_id.as_deref(), Some("user_456"));
    }

    #[test]
    fn test_new_system_message_is_admin_kind() {
        let msg = Message::new_system(
            "conv_123".to_string(),
            "admin_789".to_string(),
            "Conversation closed".to_string(),
        );

        assert_eq!(msg.sender_kind, SenderKind::Admin);
        assert!(msg.is_system);
    }

    #[test]
    fn test_validate_body_empty() {
        let result = Message::validate_body("   ");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), "Message body cannot be empty");
    }

    #[test]
    fn test_validate_body_too_long() {
        let body = "a".repeat(10_001);
        let result = Message::validate_body(&body);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("too long"));
    }

    #[test]
    fn test_validate_body_valid() {
        assert!(Message::validate_body("Hello, world!").is_ok());
    }
}
