use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Draft,
    Waiting,
    Active,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Draft => "draft",
            ConversationStatus::Waiting => "waiting",
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Convert from string (for SQLx)
impl From<String> for ConversationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "waiting" => ConversationStatus::Waiting,
            "active" => ConversationStatus::Active,
            "closed" => ConversationStatus::Closed,
            _ => ConversationStatus::Draft,
        }
    }
}

// Allow reading from DB as string
impl sqlx::Type<sqlx::Any> for ConversationStatus {
    fn type_info() -> sqlx::any::AnyTypeInfo {
        <String as sqlx::Type<sqlx::Any>>::type_info()
    }

    fn compatible(ty: &sqlx::any::AnyTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Any>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Any> for ConversationStatus {
    fn decode(value: sqlx::any::AnyValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Any>>::decode(value)?;
        Ok(ConversationStatus::from(s))
    }
}

/// Who started the chat: a registered user, or an anonymous guest who
/// supplied a name (and optionally an email) in the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitorIdentity {
    Registered { user_id: String },
    Guest { name: String, email: Option<String> },
}

impl VisitorIdentity {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            VisitorIdentity::Registered { user_id } => Some(user_id),
            VisitorIdentity::Guest { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub status: ConversationStatus,
    pub visitor_user_id: Option<String>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub owner_admin_id: Option<String>,
    pub last_activity_at: String, // ISO8601 string from DB
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    pub fn visitor(&self) -> VisitorIdentity {
        match &self.visitor_user_id {
            Some(user_id) => VisitorIdentity::Registered {
                user_id: user_id.clone(),
            },
            None => VisitorIdentity::Guest {
                name: self.guest_name.clone().unwrap_or_default(),
                email: self.guest_email.clone(),
            },
        }
    }

    pub fn is_owned_by(&self, admin_id: &str) -> bool {
        self.owner_admin_id.as_deref() == Some(admin_id)
    }

    pub fn last_activity_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_activity_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn closed_at_datetime(&self) -> Option<DateTime<Utc>> {
        self.closed_at
            .as_ref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Ownership invariant: an owner implies active/closed, and waiting
    /// implies unowned. Must hold at every observable point.
    pub fn holds_ownership_invariant(&self) -> bool {
        let owner_implies_status = self.owner_admin_id.is_none()
            || matches!(
                self.status,
                ConversationStatus::Active | ConversationStatus::Closed
            );
        let waiting_implies_unowned =
            self.status != ConversationStatus::Waiting || self.owner_admin_id.is_none();
        owner_implies_status && waiting_implies_unowned
    }
}

/// Filter for listing conversations on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationFilter {
    Waiting,
    Active,
    AssignedTo(String),
    All,
}

/// Dashboard counters for a single admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub waiting: i64,
    pub active: i64,
    pub closed_today: i64,
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ConversationStatus::Draft,
            ConversationStatus::Waiting,
            ConversationStatus::Active,
            ConversationStatus::Closed,
        ] {
            assert_eq!(ConversationStatus::from(status.to_string()), status);
        }
    }

    #[test]
    fn test_visitor_view_for_guest() {
        let conversation = Conversation {
            id: "c1".to_string(),
            status: ConversationStatus::Draft,
            visitor_user_id: None,
            guest_name: Some("Ann".to_string()),
            guest_email: Some("ann@example.com".to_string()),
            owner_admin_id: None,
            last_activity_at: "2025-01-01T00:00:00Z".to_string(),
            closed_at: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };

        assert_eq!(
            conversation.visitor(),
            VisitorIdentity::Guest {
                name: "Ann".to_string(),
                email: Some("ann@example.com".to_string()),
            }
        );
        assert!(conversation.visitor().user_id().is_none());
    }
}
