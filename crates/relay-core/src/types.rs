use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An outbound message waiting for (or done with) delivery.
///
/// `sent` and `sent_at` move together: a sent message always carries the
/// instant of the cycle that delivered it, an unsent one never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Row id assigned by storage.
    pub id: i64,
    pub content: String,
    pub author: String,
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// True when the `sent` flag and `sent_at` agree with each other.
    pub fn is_consistent(&self) -> bool {
        self.sent == self.sent_at.is_some()
    }
}

/// Payload for creating a new unsent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,
    pub author: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sent: bool, sent_at: Option<DateTime<Utc>>) -> Message {
        let now = Utc::now();
        Message {
            id: 1,
            content: "hello".to_string(),
            author: "alice".to_string(),
            sent,
            sent_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unsent_without_timestamp_is_consistent() {
        assert!(sample(false, None).is_consistent());
    }

    #[test]
    fn sent_flag_and_timestamp_must_agree() {
        assert!(sample(true, Some(Utc::now())).is_consistent());
        assert!(!sample(true, None).is_consistent());
        assert!(!sample(false, Some(Utc::now())).is_consistent());
    }

    #[test]
    fn unsent_message_omits_sent_at_in_json() {
        let json = serde_json::to_string(&sample(false, None)).unwrap();
        assert!(json.contains(r#""sent":false"#));
        assert!(!json.contains("sent_at"));
    }
}
