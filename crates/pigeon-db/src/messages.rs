use chrono::Utc;
use pigeon_types::models::{
    Message, NewMessage, ReadReceipt, ReceivedMessage, SentMessage, UserProfile,
};
use rusqlite::{Connection, Row, params};
use tracing::{debug, info};

use crate::error::{OptionalExt, Violation, violation};
use crate::{Database, DbError, Result};

impl Database {
    // -- Messages --

    /// Store a message. Unknown sender or recipient surfaces as `NotFound`
    /// through the foreign-key constraint.
    pub fn create_message(
        &self,
        from_username: &str,
        to_username: &str,
        body: &str,
    ) -> Result<NewMessage> {
        let sent_at = Utc::now();

        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (from_username, to_username, body, sent_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![from_username, to_username, body, sent_at],
            )
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey) => DbError::NotFound(format!(
                    "sender {from_username} or recipient {to_username}"
                )),
                _ => e.into(),
            })?;
            Ok(conn.last_insert_rowid())
        })?;

        info!("Message {} sent from {} to {}", id, from_username, to_username);

        Ok(NewMessage {
            id,
            from_username: from_username.to_string(),
            to_username: to_username.to_string(),
            body: body.to_string(),
            sent_at,
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Message> {
        self.with_conn(|conn| query_message(conn, id))?
            .ok_or_else(|| DbError::NotFound(format!("message {id}")))
    }

    /// Set `read_at` if it is still empty and return whatever is stored
    /// afterwards. Repeated calls keep the first timestamp.
    pub fn mark_read(&self, id: i64) -> Result<ReadReceipt> {
        let receipt = self
            .with_conn(|conn| {
                conn.query_row(
                    "UPDATE messages SET read_at = COALESCE(read_at, ?2)
                     WHERE id = ?1
                     RETURNING id, read_at",
                    params![id, Utc::now()],
                    |row| {
                        Ok(ReadReceipt {
                            id: row.get(0)?,
                            read_at: row.get(1)?,
                        })
                    },
                )
                .optional()
            })?
            .ok_or_else(|| DbError::NotFound(format!("message {id}")))?;

        debug!("Message {} read at {}", receipt.id, receipt.read_at);
        Ok(receipt)
    }

    /// Outbox of `username`, oldest first.
    pub fn messages_from(&self, username: &str) -> Result<Vec<SentMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        u.username, u.first_name, u.last_name, u.phone
                 FROM messages m
                 JOIN users u ON m.to_username = u.username
                 WHERE m.from_username = ?1
                 ORDER BY m.id",
            )?;

            let rows = stmt
                .query_map([username], |row| {
                    Ok(SentMessage {
                        id: row.get(0)?,
                        body: row.get(1)?,
                        sent_at: row.get(2)?,
                        read_at: row.get(3)?,
                        to_user: profile_at(row, 4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Inbox of `username`, oldest first.
    pub fn messages_to(&self, username: &str) -> Result<Vec<ReceivedMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        u.username, u.first_name, u.last_name, u.phone
                 FROM messages m
                 JOIN users u ON m.from_username = u.username
                 WHERE m.to_username = ?1
                 ORDER BY m.id",
            )?;

            let rows = stmt
                .query_map([username], |row| {
                    Ok(ReceivedMessage {
                        id: row.get(0)?,
                        body: row.get(1)?,
                        sent_at: row.get(2)?,
                        read_at: row.get(3)?,
                        from_user: profile_at(row, 4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<Message>> {
    // Both participants joined in one query
    let mut stmt = conn.prepare(
        "SELECT m.id, m.body, m.sent_at, m.read_at,
                f.username, f.first_name, f.last_name, f.phone,
                t.username, t.first_name, t.last_name, t.phone
         FROM messages m
         JOIN users f ON m.from_username = f.username
         JOIN users t ON m.to_username = t.username
         WHERE m.id = ?1",
    )?;

    stmt.query_row([id], |row| {
        Ok(Message {
            id: row.get(0)?,
            body: row.get(1)?,
            sent_at: row.get(2)?,
            read_at: row.get(3)?,
            from_user: profile_at(row, 4)?,
            to_user: profile_at(row, 8)?,
        })
    })
    .optional()
}

/// Read four consecutive columns (username, first, last, phone) starting at `start`.
fn profile_at(row: &Row<'_>, start: usize) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        username: row.get(start)?,
        first_name: row.get(start + 1)?,
        last_name: row.get(start + 2)?,
        phone: row.get(start + 3)?,
    })
}
