//! Conversation and message records.
//!
//! Field names serialize in camelCase because the same records form the
//! persisted snapshot format.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::ids::{ConversationId, MessageId};

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique, monotonically assigned identifier.
    pub id: MessageId,
    /// Message body, already trimmed and non-empty.
    pub text: String,
    /// `true` when sent by the local user, `false` when received from the counterpart.
    pub from_me: bool,
    /// Creation time; used for ordering and display.
    pub timestamp: DateTime<Utc>,
}

/// Display data for the counterpart of a conversation.
///
/// Never used for identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name.
    pub name: String,
    /// Optional role or title (e.g. "Angel investor").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Optional location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Participant {
    /// Create a participant with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            location: None,
        }
    }

    /// Set the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Which directory or flow produced a conversation. Labeling only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationSource {
    /// Started from the investor directory.
    InvestorDirectory,
    /// Started from the mentor directory.
    MentorDirectory,
    /// Started from the startup directory.
    StartupDirectory,
    /// Started from the teacher directory.
    TeacherDirectory,
    /// Started from the agency directory.
    AgencyDirectory,
    /// Started from the incubator directory.
    IncubatorDirectory,
    /// Started from the expert directory.
    ExpertDirectory,
    /// Started by scanning a QR code at an event.
    QrNetworking,
    /// Started by accepting a connection request.
    ConnectionRequest,
}

impl ConversationSource {
    /// All known sources.
    pub const ALL: [Self; 9] = [
        Self::InvestorDirectory,
        Self::MentorDirectory,
        Self::StartupDirectory,
        Self::TeacherDirectory,
        Self::AgencyDirectory,
        Self::IncubatorDirectory,
        Self::ExpertDirectory,
        Self::QrNetworking,
        Self::ConnectionRequest,
    ];

    /// Stable tag used in the persisted format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvestorDirectory => "investor-directory",
            Self::MentorDirectory => "mentor-directory",
            Self::StartupDirectory => "startup-directory",
            Self::TeacherDirectory => "teacher-directory",
            Self::AgencyDirectory => "agency-directory",
            Self::IncubatorDirectory => "incubator-directory",
            Self::ExpertDirectory => "expert-directory",
            Self::QrNetworking => "qr-networking",
            Self::ConnectionRequest => "connection-request",
        }
    }

    /// Human readable label for list badges.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InvestorDirectory => "Investor",
            Self::MentorDirectory => "Mentor",
            Self::StartupDirectory => "Startup",
            Self::TeacherDirectory => "Teacher",
            Self::AgencyDirectory => "Agency",
            Self::IncubatorDirectory => "Incubator",
            Self::ExpertDirectory => "Expert",
            Self::QrNetworking => "QR networking",
            Self::ConnectionRequest => "Connection request",
        }
    }
}

impl fmt::Display for ConversationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationSource {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| MessagingError::InvalidSnapshot(format!("unknown source tag: {s}")))
    }
}

/// A thread of messages between the local user and one counterpart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Stable identifier.
    pub id: ConversationId,
    /// Counterpart display data.
    pub participant: Participant,
    /// Origin of the relationship.
    pub source: ConversationSource,
    /// Messages in insertion (= chronological) order.
    pub messages: Vec<Message>,
    /// Text of the most recent message, empty when there are none.
    pub last_message: String,
    /// Counterpart messages not yet acknowledged.
    pub unread_count: u32,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub const fn new(
        id: ConversationId,
        participant: Participant,
        source: ConversationSource,
    ) -> Self {
        Self {
            id,
            participant,
            source,
            messages: Vec::new(),
            last_message: String::new(),
            unread_count: 0,
        }
    }

    /// Number of messages received from the counterpart.
    #[must_use]
    pub fn incoming_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.from_me).count()
    }

    /// Timestamp of the most recent message.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Append a message, maintaining `last_message` and `unread_count`.
    ///
    /// The timestamp is clamped so that it never precedes the previous message.
    /// `is_open` only matters for counterpart messages: an open conversation
    /// reads them immediately.
    pub(crate) fn append(&mut self, mut message: Message, is_open: bool) {
        if let Some(last) = self.last_timestamp() {
            message.timestamp = message.timestamp.max(last);
        }
        if !message.from_me && !is_open {
            self.unread_count = self.unread_count.saturating_add(1);
        }
        self.last_message.clone_from(&message.text);
        self.messages.push(message);
    }

    /// Reset the unread counter. Returns `true` if it changed.
    pub(crate) fn mark_read(&mut self) -> bool {
        let changed = self.unread_count != 0;
        self.unread_count = 0;
        changed
    }

    /// Check the record-level invariants.
    ///
    /// # Errors
    /// Returns `InvalidSnapshot` describing the first violated invariant.
    pub fn validate(&self) -> MessagingResult<()> {
        let incoming = self.incoming_count();
        if usize::try_from(self.unread_count).map_or(true, |unread| unread > incoming) {
            return Err(MessagingError::InvalidSnapshot(format!(
                "conversation {}: unreadCount {} exceeds {incoming} incoming messages",
                self.id, self.unread_count
            )));
        }

        if let Some(pos) = self
            .messages
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(MessagingError::InvalidSnapshot(format!(
                "conversation {}: message {} is older than its predecessor",
                self.id,
                self.messages[pos + 1].id
            )));
        }

        if let Some(message) = self.messages.iter().find(|m| m.text.trim().is_empty()) {
            return Err(MessagingError::InvalidSnapshot(format!(
                "conversation {}: message {} has empty text",
                self.id, message.id
            )));
        }

        let expected_last = self.messages.last().map_or("", |m| m.text.as_str());
        if self.last_message != expected_last {
            return Err(MessagingError::InvalidSnapshot(format!(
                "conversation {}: lastMessage does not match the most recent message",
                self.id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> MessagingResult<Conversation> {
        Ok(Conversation::new(
            ConversationId::new("c1")?,
            Participant::named("Ada").with_role("Mentor"),
            ConversationSource::MentorDirectory,
        ))
    }

    fn message(id: u64, text: &str, from_me: bool, secs: i64) -> Message {
        Message {
            id: MessageId::new(id),
            text: text.to_string(),
            from_me,
            timestamp: DateTime::from_timestamp(secs, 0).unwrap_or_default(),
        }
    }

    #[test]
    fn test_outgoing_append_keeps_unread() -> MessagingResult<()> {
        let mut conv = conversation()?;
        conv.append(message(1, "hi", false, 10), false);
        conv.append(message(2, "hello back", true, 20), false);

        assert_eq!(conv.unread_count, 1);
        assert_eq!(conv.last_message, "hello back");
        Ok(())
    }

    #[test]
    fn test_incoming_append_respects_open_state() -> MessagingResult<()> {
        let mut conv = conversation()?;
        conv.append(message(1, "one", false, 10), false);
        conv.append(message(2, "two", false, 20), true);

        assert_eq!(conv.unread_count, 1);
        assert_eq!(conv.incoming_count(), 2);
        Ok(())
    }

    #[test]
    fn test_append_clamps_backwards_timestamp() -> MessagingResult<()> {
        let mut conv = conversation()?;
        conv.append(message(1, "later", true, 100), false);
        conv.append(message(2, "clock skew", true, 50), false);

        assert_eq!(conv.messages[1].timestamp, conv.messages[0].timestamp);
        assert!(conv.validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_mark_read_reports_change() -> MessagingResult<()> {
        let mut conv = conversation()?;
        conv.append(message(1, "ping", false, 10), false);

        assert!(conv.mark_read());
        assert!(!conv.mark_read());
        assert_eq!(conv.unread_count, 0);
        Ok(())
    }

    #[test]
    fn test_validate_rejects_unread_overflow() -> MessagingResult<()> {
        let mut conv = conversation()?;
        conv.append(message(1, "mine", true, 10), false);
        conv.unread_count = 1;

        assert!(matches!(
            conv.validate(),
            Err(MessagingError::InvalidSnapshot(_))
        ));
        Ok(())
    }

    #[test]
    fn test_validate_rejects_stale_last_message() -> MessagingResult<()> {
        let mut conv = conversation()?;
        conv.append(message(1, "mine", true, 10), false);
        conv.last_message = "something else".to_string();

        assert!(conv.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_source_tags_round_trip_through_from_str() {
        for source in ConversationSource::ALL {
            assert_eq!(source.as_str().parse::<ConversationSource>().ok(), Some(source));
        }
        assert!("unknown".parse::<ConversationSource>().is_err());
    }

    #[test]
    fn test_participant_optional_fields_are_skipped() -> MessagingResult<()> {
        let json = serde_json::to_value(Participant::named("Grace"))?;
        assert_eq!(json, serde_json::json!({ "name": "Grace" }));
        Ok(())
    }
}
