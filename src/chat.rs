use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Visitor,
    Automated,
    Operator,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::Visitor => "visitor",
            SenderKind::Automated => "automated",
            SenderKind::Operator => "operator",
        }
    }
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visitor" => Ok(SenderKind::Visitor),
            "automated" => Ok(SenderKind::Automated),
            "operator" => Ok(SenderKind::Operator),
            other => anyhow::bail!("unknown sender kind: {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender: SenderKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(conversation_id: impl Into<String>, sender: SenderKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Who answers visitor messages. Stored as the nullable `assigned_operator`
/// column; this enum is the only shape the rest of the crate sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "ai")]
    Automated,
    #[serde(rename = "manual")]
    HumanControlled,
}

impl Mode {
    pub fn from_operator(assigned_operator: Option<&str>) -> Self {
        match assigned_operator {
            Some(_) => Mode::HumanControlled,
            None => Mode::Automated,
        }
    }

    pub fn is_human_controlled(&self) -> bool {
        matches!(self, Mode::HumanControlled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub visitor_id: String,
    pub assigned_operator: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(visitor_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            visitor_id: visitor_id.into(),
            assigned_operator: None,
            created_at: now,
            updated_at: now,
            last_seen_at: None,
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::from_operator(self.assigned_operator.as_deref())
    }
}

/// Row of the operator's inbox.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub visitor_id: String,
    pub visitor_name: Option<String>,
    pub mode: Mode,
    pub online: bool,
    pub message_count: i64,
    pub last_message: Option<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}
