use chrono::Utc;
use pigeon_types::models::{User, UserSummary};
use rusqlite::{Connection, params};
use tracing::info;

use crate::error::{OptionalExt, Violation, violation};
use crate::{Database, DbError, Result, password};

/// Fields supplied at registration.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: &'a str,
}

impl Database {
    // -- Users --

    /// Store a new user with a hashed password. Uniqueness is left to the
    /// primary key so that concurrent registrations cannot both succeed.
    pub fn register(&self, new: &NewUser<'_>) -> Result<User> {
        if new.username.is_empty() {
            return Err(DbError::InvalidInput("username must not be empty".into()));
        }
        if new.password.is_empty() {
            return Err(DbError::InvalidInput("password must not be empty".into()));
        }

        let password_hash = password::hash(new.password)?;
        let now = Utc::now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, first_name, last_name, phone, join_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    new.username,
                    password_hash,
                    new.first_name,
                    new.last_name,
                    new.phone,
                    now
                ],
            )
            .map_err(|e| match violation(&e) {
                Some(Violation::PrimaryKey) => DbError::AlreadyExists(new.username.to_string()),
                _ => e.into(),
            })?;
            Ok(())
        })?;

        info!("Registered user {}", new.username);

        Ok(User {
            username: new.username.to_string(),
            first_name: new.first_name.to_string(),
            last_name: new.last_name.to_string(),
            phone: new.phone.to_string(),
            join_at: now,
            last_login_at: now,
        })
    }

    /// True when `password` matches the stored hash. Unknown usernames are
    /// `Ok(false)`, never `NotFound`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        let stored = self.with_conn(|conn| query_password_hash(conn, username))?;

        match stored {
            Some(hash) => password::verify(password, &hash),
            None => {
                password::verify_dummy(password);
                Ok(false)
            }
        }
    }

    pub fn record_login(&self, username: &str) -> Result<()> {
        let updated = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users SET last_login_at = ?2 WHERE username = ?1",
                params![username, Utc::now()],
            )?)
        })?;

        if updated == 0 {
            return Err(DbError::NotFound(format!("user {username}")));
        }
        Ok(())
    }

    pub fn all_users(&self) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT username, first_name, last_name FROM users ORDER BY rowid")?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(UserSummary {
                        username: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_user(&self, username: &str) -> Result<User> {
        self.with_conn(|conn| query_user(conn, username))?
            .ok_or_else(|| DbError::NotFound(format!("user {username}")))
    }
}

fn query_password_hash(conn: &Connection, username: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT password FROM users WHERE username = ?1",
        [username],
        |row| row.get(0),
    )
    .optional()
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT username, first_name, last_name, phone, join_at, last_login_at
         FROM users WHERE username = ?1",
    )?;

    stmt.query_row([username], |row| {
        Ok(User {
            username: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            phone: row.get(3)?,
            join_at: row.get(4)?,
            last_login_at: row.get(5)?,
        })
    })
    .optional()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn add_user(db: &Database, username: &str) -> User {
        db.register(&NewUser {
            username,
            password: "password",
            first_name: "First",
            last_name: "Last",
            phone: "+14155550000",
        })
        .unwrap()
    }

    #[test]
    fn register_then_get() {
        let db = Database::open_in_memory().unwrap();
        let created = add_user(&db, "test1");

        let fetched = db.get_user("test1").unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.join_at, fetched.last_login_at);
    }

    #[test]
    fn password_is_stored_hashed() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "test1");

        let stored = db
            .with_conn(|conn| query_password_hash(conn, "test1"))
            .unwrap()
            .unwrap();
        assert_ne!(stored, "password");
        assert!(stored.starts_with("$argon2"));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let first = add_user(&db, "test1");

        let second = db.register(&NewUser {
            username: "test1",
            password: "other",
            first_name: "Other",
            last_name: "Person",
            phone: "555",
        });
        assert!(matches!(second, Err(DbError::AlreadyExists(_))));

        // Original record untouched
        assert_eq!(db.get_user("test1").unwrap(), first);
        assert!(db.authenticate("test1", "password").unwrap());
        assert!(!db.authenticate("test1", "other").unwrap());
    }

    #[test]
    fn empty_credentials_are_invalid() {
        let db = Database::open_in_memory().unwrap();
        let result = db.register(&NewUser {
            username: "",
            password: "password",
            first_name: "",
            last_name: "",
            phone: "",
        });
        assert!(matches!(result, Err(DbError::InvalidInput(_))));

        let result = db.register(&NewUser {
            username: "test1",
            password: "",
            first_name: "",
            last_name: "",
            phone: "",
        });
        assert!(matches!(result, Err(DbError::InvalidInput(_))));
    }

    #[test]
    fn authenticate_cases() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "test1");

        assert!(db.authenticate("test1", "password").unwrap());
        assert!(!db.authenticate("test1", "wrong").unwrap());
        assert!(!db.authenticate("nobody", "password").unwrap());
    }

    #[test]
    fn record_login_moves_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let created = add_user(&db, "test1");

        db.record_login("test1").unwrap();
        let after = db.get_user("test1").unwrap();
        assert!(after.last_login_at >= created.last_login_at);
        assert_eq!(after.join_at, created.join_at);

        assert!(matches!(db.record_login("nobody"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn all_users_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "zed");
        add_user(&db, "amy");

        let names: Vec<_> = db.all_users().unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["zed", "amy"]);
    }

    #[test]
    fn get_unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user("ghost"), Err(DbError::NotFound(_))));
    }
}
