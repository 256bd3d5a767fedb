use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Outreach medium a sequence step is executed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Call,
    LinkedinConnect,
    LinkedinInmail,
    Whatsapp,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Email,
        Channel::Call,
        Channel::LinkedinConnect,
        Channel::LinkedinInmail,
        Channel::Whatsapp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Call => "call",
            Channel::LinkedinConnect => "linkedin_connect",
            Channel::LinkedinInmail => "linkedin_inmail",
            Channel::Whatsapp => "whatsapp",
        }
    }

    pub fn parse(raw: &str) -> Option<Channel> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enriched contact as returned by the discovery/enrichment service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub company_domain: Option<String>,
}

/// Enriched company profile keyed by its web domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Lifecycle events emitted by the cadence engine. Delivery (chat cards,
/// webhooks) is up to whichever sink is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Enrolled,
    StepCompleted,
    EnrollmentCompleted,
    Paused,
    Resumed,
    Unenrolled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub enrollment_id: Uuid,
    pub contact_id: String,
    pub step_index: Option<usize>,
    pub channel: Option<Channel>,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_wire_names() {
        for channel in Channel::ALL {
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.as_str()));
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("telegram"), None);
        assert_eq!(Channel::parse("Email"), None);
    }

    #[test]
    fn test_contact_defaults_optional_fields() {
        let contact: Contact =
            serde_json::from_str(r#"{"id":"c-1","name":"Ada Lovelace"}"#).unwrap();
        assert_eq!(contact.id, "c-1");
        assert!(contact.email.is_none());
        assert!(contact.company_domain.is_none());
    }
}
