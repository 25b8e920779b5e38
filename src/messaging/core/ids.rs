//! Identifier types for conversations and messages.
//!
//! Conversation ids are stable strings chosen by whoever seeds the store (`"c1"`,
//! `"investor-42"`, ...). Message ids are allocated by the store from a
//! monotonically increasing counter.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors returned when parsing/validating a [`ConversationId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
    /// Contains a control character.
    InvalidChar {
        /// The invalid character.
        ch: char,
        /// The index where it was found.
        index: usize,
    },
}

impl fmt::Display for ConversationIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "conversation id must not be empty"),
            Self::TooLong { max, got } => {
                write!(f, "conversation id too long: got {got}, max {max}")
            }
            Self::InvalidChar { ch, index } => write!(
                f,
                "conversation id contains invalid character {ch:?} at index {index}"
            ),
        }
    }
}

impl std::error::Error for ConversationIdError {}

/// Identifier of a conversation.
///
/// Immutable once assigned and unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    /// Hard ceiling to prevent pathological payloads.
    pub const MAX_LEN: usize = 128;

    /// Build a validated `ConversationId`.
    ///
    /// Rules:
    /// - Non-empty after trimming.
    /// - Max length limited.
    /// - No control characters.
    ///
    /// # Errors
    /// Returns `ConversationIdError` if the input is empty, too long, or contains
    /// control characters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ConversationIdError> {
        let s = raw.as_ref().trim();

        if s.is_empty() {
            return Err(ConversationIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(ConversationIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }
        if let Some((index, ch)) = s.chars().enumerate().find(|(_, ch)| ch.is_control()) {
            return Err(ConversationIdError::InvalidChar { ch, index });
        }

        Ok(Self(s.to_owned()))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationId {
    type Err = ConversationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for ConversationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ConversationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ConversationIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Identifier of a single message.
///
/// Allocated by the conversation store; every new id is strictly greater than
/// any id already present in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Wrap a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Extract the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one, or `None` once the id space is exhausted.
    #[inline]
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
