//! Built-in default conversations.
//!
//! Used whenever no valid snapshot is persisted: first launch, corrupt data,
//! or after the user clears local data.

use chrono::{DateTime, TimeDelta, Utc};

use crate::messaging::core::ids::{ConversationId, MessageId};
use crate::messaging::core::types::{Conversation, ConversationSource, Message, Participant};

/// 2024-03-04T09:00:00Z, so seeded conversations look the same on every launch.
const SEED_EPOCH_SECS: i64 = 1_709_542_800;

struct SeedBuilder {
    next_id: MessageId,
    clock: DateTime<Utc>,
}

impl SeedBuilder {
    fn new() -> Self {
        Self {
            next_id: MessageId::new(1),
            clock: DateTime::from_timestamp(SEED_EPOCH_SECS, 0).unwrap_or_default(),
        }
    }

    fn push(&mut self, conv: &mut Conversation, text: &str, from_me: bool, unread: bool) {
        self.clock += TimeDelta::minutes(7);
        let message = Message {
            id: self.next_id,
            text: text.to_string(),
            from_me,
            timestamp: self.clock,
        };
        self.next_id = MessageId::new(self.next_id.get() + 1);
        conv.append(message, !unread);
    }
}

fn conversation(
    id: &str,
    participant: Participant,
    source: ConversationSource,
) -> Option<Conversation> {
    ConversationId::new(id)
        .ok()
        .map(|id| Conversation::new(id, participant, source))
}

/// The default conversation set.
///
/// `c1` starts with two unread investor messages; the others cover every
/// flow that can open a conversation.
#[must_use]
pub fn default_conversations() -> Vec<Conversation> {
    let mut seed = SeedBuilder::new();
    let mut out = Vec::new();

    if let Some(mut conv) = conversation(
        "c1",
        Participant::named("Sarah Chen")
            .with_role("Partner, Horizon Ventures")
            .with_location("San Francisco, CA"),
        ConversationSource::InvestorDirectory,
    ) {
        seed.push(&mut conv, "Hi! Thanks for connecting.", true, false);
        seed.push(
            &mut conv,
            "Happy to. I read your deck, the traction numbers are impressive.",
            false,
            true,
        );
        seed.push(
            &mut conv,
            "Would you have 30 minutes next week to walk me through the roadmap?",
            false,
            true,
        );
        out.push(conv);
    }

    if let Some(mut conv) = conversation(
        "c2",
        Participant::named("Marcus Johnson")
            .with_role("Growth mentor")
            .with_location("Austin, TX"),
        ConversationSource::MentorDirectory,
    ) {
        seed.push(
            &mut conv,
            "Saw you're working on go-to-market. Want to compare notes?",
            false,
            false,
        );
        seed.push(&mut conv, "Absolutely, that would help a lot.", true, false);
        seed.push(
            &mut conv,
            "Great. Send me your current funnel metrics when you can.",
            false,
            true,
        );
        out.push(conv);
    }

    if let Some(mut conv) = conversation(
        "c3",
        Participant::named("Priya Patel")
            .with_role("Founder, LedgerLeaf")
            .with_location("London, UK"),
        ConversationSource::StartupDirectory,
    ) {
        seed.push(
            &mut conv,
            "We're building in adjacent spaces, would love to chat about a partnership.",
            true,
            false,
        );
        seed.push(&mut conv, "Sounds interesting, let's set something up.", false, false);
        out.push(conv);
    }

    if let Some(mut conv) = conversation(
        "c4",
        Participant::named("Diego Alvarez").with_role("Product designer"),
        ConversationSource::QrNetworking,
    ) {
        seed.push(&mut conv, "Great meeting you at the demo day!", false, true);
        out.push(conv);
    }

    if let Some(mut conv) = conversation(
        "c5",
        Participant::named("Emily Nakamura")
            .with_role("Program lead, Catalyst Incubator")
            .with_location("Seattle, WA"),
        ConversationSource::ConnectionRequest,
    ) {
        seed.push(
            &mut conv,
            "Thanks for accepting my request. Applications for our spring cohort are open.",
            false,
            false,
        );
        seed.push(&mut conv, "Thanks, I'll take a look this week.", true, false);
        out.push(conv);
    }

    out
}
