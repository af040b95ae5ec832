//! Access rules for individual messages. These depend on the stored message,
//! so they run in handlers after the fetch rather than as route middleware.

use pigeon_types::models::Message;

/// Sender or recipient.
pub fn is_participant(identity: &str, message: &Message) -> bool {
    identity == message.from_user.username || identity == message.to_user.username
}

pub fn can_view(identity: &str, message: &Message) -> bool {
    is_participant(identity, message)
}

/// Only the recipient may mark a message as read.
pub fn can_mark_read(identity: &str, message: &Message) -> bool {
    identity == message.to_user.username
}
