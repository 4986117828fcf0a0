use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier grouping a sequence of chat turns and their tool
/// invocations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two roles that participate in a reconstructed conversation. The
/// durable log may hold other role strings; those rows are kept but never
/// enter a transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Strict parse: anything other than the two conversational roles is
    /// `None`, which is how history reconstruction filters the log.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A raw row from the durable message log, role string unvalidated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: SessionId,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One message of a reconstructed transcript (role already validated).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: MessageRole,
    pub content: String,
}

/// A recorded tool invocation: arguments and result as serialized JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: i64,
    pub session_id: SessionId,
    pub name: String,
    pub args_json: String,
    pub result_json: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub started: DateTime<Utc>,
    pub message_count: i64,
}

#[cfg(test)]
mod tests {
    use super::MessageRole;

    #[test]
    fn only_conversational_roles_parse() {
        assert_eq!(MessageRole::parse("user"), Some(MessageRole::User));
        assert_eq!(MessageRole::parse("assistant"), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse("system"), None);
        assert_eq!(MessageRole::parse("tool"), None);
        assert_eq!(MessageRole::parse(""), None);
    }
}
