use std::collections::HashSet;

use crate::Database;
use crate::models::{
    FollowRow, LikeRow, LikeToggle, MessageRow, NewUserRow, ProfileUpdate, UserRow,
};
use anyhow::{Result, anyhow};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};
use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, UserStats};

const USER_COLUMNS: &str =
    "u.id, u.email, u.username, u.image_url, u.header_image_url, u.bio, u.location, u.password";

const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id, u.username, u.image_url";

impl Database {
    // -- Users --

    pub fn create_user(&self, new: &NewUserRow<'_>) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, image_url)
                 VALUES (?1, ?2, ?3, COALESCE(NULLIF(?4, ''), ?5))",
                params![
                    new.username,
                    new.email,
                    new.password_hash,
                    new.image_url,
                    DEFAULT_IMAGE_URL
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or_else(|| anyhow!("User {} missing after insert", id))
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1");
            conn.query_row(&sql, [username], user_from_row).optional()
        })
    }

    /// All users, or those whose username contains `search`.
    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 WHERE ?1 IS NULL OR u.username LIKE ?1 ESCAPE '\\'
                 ORDER BY u.username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([pattern], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_profile(&self, id: i64, update: &ProfileUpdate<'_>) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    username = ?1,
                    email = ?2,
                    image_url = COALESCE(NULLIF(?3, ''), ?4),
                    header_image_url = COALESCE(NULLIF(?5, ''), ?6),
                    bio = ?7,
                    location = ?8
                 WHERE id = ?9",
                params![
                    update.username,
                    update.email,
                    update.image_url,
                    DEFAULT_IMAGE_URL,
                    update.header_image_url,
                    DEFAULT_HEADER_IMAGE_URL,
                    update.bio,
                    update.location,
                    id
                ],
            )?;
            query_user_by_id(conn, id)?.ok_or_else(|| anyhow!("User not found: {}", id))
        })
    }

    /// Deletes the user; messages, likes and follow edges go with it.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0))
    }

    pub fn user_stats(&self, user_id: i64) -> Result<UserStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_following_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [user_id],
                |row| {
                    Ok(UserStats {
                        messages: row.get(0)?,
                        following: row.get(1)?,
                        followers: row.get(2)?,
                        likes: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Messages --

    pub fn create_message(&self, user_id: i64, text: &str) -> Result<MessageRow> {
        // Fixed-width UTC timestamps sort lexically in insertion order.
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (text, timestamp, user_id) VALUES (?1, ?2, ?3)",
                params![text, timestamp, user_id],
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?.ok_or_else(|| anyhow!("Message {} missing after insert", id))
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0))
    }

    /// A user's own messages, newest first.
    pub fn user_messages(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            );
            query_messages(conn, &sql, params![user_id, limit])
        })
    }

    /// Messages by the user and everyone they follow, newest first.
    pub fn home_feed(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.user_id = ?1
                    OR m.user_id IN (
                        SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1
                    )
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            );
            query_messages(conn, &sql, params![user_id, limit])
        })
    }

    // -- Follows --

    /// Records that `follower_id` follows `followed_id`. Returns false when
    /// the edge already existed.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (user_being_followed_id, user_following_id)
                 VALUES (?1, ?2)",
                params![followed_id, follower_id],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                params![followed_id, follower_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn find_follow(&self, follower_id: i64, followed_id: i64) -> Result<Option<FollowRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_being_followed_id, user_following_id FROM follows
                 WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                params![followed_id, follower_id],
                |row| {
                    Ok(FollowRow {
                        user_being_followed_id: row.get(0)?,
                        user_following_id: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Does `user_id` follow `other_id`?
    pub fn is_following(&self, user_id: i64, other_id: i64) -> Result<bool> {
        Ok(self.find_follow(user_id, other_id)?.is_some())
    }

    /// Is `user_id` followed by `other_id`?
    pub fn is_followed_by(&self, user_id: i64, other_id: i64) -> Result<bool> {
        Ok(self.find_follow(other_id, user_id)?.is_some())
    }

    /// Users that `user_id` follows.
    pub fn following(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 JOIN follows f ON f.user_being_followed_id = u.id
                 WHERE f.user_following_id = ?1
                 ORDER BY u.username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 JOIN follows f ON f.user_following_id = u.id
                 WHERE f.user_being_followed_id = ?1
                 ORDER BY u.username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn following_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<i64>, _>>()?;
            Ok(ids)
        })
    }

    // -- Likes --

    /// Toggle a like: removes it if present, inserts it if not.
    pub fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<LikeToggle> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    params![user_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = if let Some(like_id) = existing {
                tx.execute("DELETE FROM likes WHERE id = ?1", [like_id])?;
                LikeToggle::Removed
            } else {
                tx.execute(
                    "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                    params![user_id, message_id],
                )?;
                LikeToggle::Added
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn find_like(&self, user_id: i64, message_id: i64) -> Result<Option<LikeRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, message_id FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id, message_id],
                |row| {
                    Ok(LikeRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        message_id: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn liked_message_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<i64>, _>>()?;
            Ok(ids)
        })
    }

    /// Messages `user_id` has liked, newest first.
    pub fn liked_messages(&self, user_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM likes l
                 JOIN messages m ON l.message_id = m.id
                 JOIN users u ON m.user_id = u.id
                 WHERE l.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC"
            );
            query_messages(conn, &sql, params![user_id])
        })
    }
}

/// Escapes LIKE wildcards so `s` matches literally under `ESCAPE '\'`.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        image_url: row.get(3)?,
        header_image_url: row.get(4)?,
        bio: row.get(5)?,
        location: row.get(6)?,
        password: row.get(7)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp: row.get(2)?,
        user_id: row.get(3)?,
        author_username: row.get(4)?,
        author_image_url: row.get(5)?,
    })
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    conn.query_row(&sql, [id], user_from_row).optional()
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m JOIN users u ON m.user_id = u.id WHERE m.id = ?1"
    );
    conn.query_row(&sql, [id], message_from_row).optional()
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_integrity_error;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn user(db: &Database, name: &str) -> UserRow {
        let email = format!("{name}@test.com");
        db.create_user(&NewUserRow {
            username: Some(name),
            email: Some(&email),
            password_hash: Some("HASHED_PASSWORD"),
            image_url: None,
        })
        .unwrap()
    }

    #[test]
    fn new_user_has_no_messages_or_followers() {
        let db = db();
        let u = user(&db, "testuser");

        assert_eq!(u.username, "testuser");
        assert_eq!(u.email, "testuser@test.com");
        assert_eq!(u.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(u.header_image_url, DEFAULT_HEADER_IMAGE_URL);
        assert!(db.user_messages(u.id, 100).unwrap().is_empty());
        assert!(db.followers(u.id).unwrap().is_empty());
        assert_eq!(db.user_stats(u.id).unwrap(), UserStats::default());
    }

    #[test]
    fn missing_or_duplicate_fields_are_integrity_errors() {
        let db = db();
        user(&db, "testuser");

        let no_email = db.create_user(&NewUserRow {
            username: Some("other"),
            email: None,
            password_hash: Some("x"),
            image_url: None,
        });
        assert!(is_integrity_error(&no_email.unwrap_err()));

        let no_username = db.create_user(&NewUserRow {
            username: None,
            email: Some("other@test.com"),
            password_hash: Some("x"),
            image_url: None,
        });
        assert!(is_integrity_error(&no_username.unwrap_err()));

        let duplicate = db.create_user(&NewUserRow {
            username: Some("testuser"),
            email: Some("fresh@test.com"),
            password_hash: Some("x"),
            image_url: None,
        });
        assert!(is_integrity_error(&duplicate.unwrap_err()));

        let duplicate_email = db.create_user(&NewUserRow {
            username: Some("fresh"),
            email: Some("testuser@test.com"),
            password_hash: Some("x"),
            image_url: None,
        });
        assert!(is_integrity_error(&duplicate_email.unwrap_err()));
    }

    #[test]
    fn message_belongs_to_its_author() {
        let db = db();
        let u = user(&db, "testuser");

        let msg = db.create_message(u.id, "test msg").unwrap();
        assert_eq!(msg.text, "test msg");
        assert_eq!(msg.user_id, u.id);
        assert_eq!(msg.author_username, "testuser");

        let messages = db.user_messages(u.id, 100).unwrap();
        assert_eq!(messages, vec![msg]);
    }

    #[test]
    fn message_requires_existing_author_and_short_text() {
        let db = db();
        let u = user(&db, "testuser");

        let orphan = db.create_message(9999, "hello").unwrap_err();
        assert!(is_integrity_error(&orphan));

        let long = "x".repeat(141);
        assert!(is_integrity_error(&db.create_message(u.id, &long).unwrap_err()));
    }

    #[test]
    fn is_following_and_is_followed_by_track_direction() {
        let db = db();
        let u1 = user(&db, "testUser");
        let u2 = user(&db, "testUser2");

        assert!(!db.is_following(u1.id, u2.id).unwrap());
        assert!(db.follow(u1.id, u2.id).unwrap());
        assert!(!db.follow(u1.id, u2.id).unwrap(), "edge is unique");

        assert!(db.is_following(u1.id, u2.id).unwrap());
        assert!(!db.is_following(u2.id, u1.id).unwrap());
        assert!(db.is_followed_by(u2.id, u1.id).unwrap());
        assert!(!db.is_followed_by(u1.id, u2.id).unwrap());

        assert_eq!(db.following(u1.id).unwrap(), vec![u2.clone()]);
        assert_eq!(db.followers(u2.id).unwrap(), vec![u1.clone()]);

        assert!(db.unfollow(u1.id, u2.id).unwrap());
        assert!(db.find_follow(u1.id, u2.id).unwrap().is_none());
    }

    #[test]
    fn toggle_like_adds_then_removes() {
        let db = db();
        let author = user(&db, "author");
        let fan = user(&db, "fan");
        let msg = db.create_message(author.id, "likeable").unwrap();

        assert_eq!(db.toggle_like(fan.id, msg.id).unwrap(), LikeToggle::Added);
        let like = db.find_like(fan.id, msg.id).unwrap().unwrap();
        assert_eq!((like.user_id, like.message_id), (fan.id, msg.id));
        assert_eq!(db.liked_messages(fan.id).unwrap(), vec![msg.clone()]);

        assert_eq!(db.toggle_like(fan.id, msg.id).unwrap(), LikeToggle::Removed);
        assert!(db.find_like(fan.id, msg.id).unwrap().is_none());
        assert!(db.liked_message_ids(fan.id).unwrap().is_empty());
    }

    #[test]
    fn home_feed_includes_self_and_followed_only() {
        let db = db();
        let me = user(&db, "me");
        let friend = user(&db, "friend");
        let stranger = user(&db, "stranger");

        db.follow(me.id, friend.id).unwrap();
        let mine = db.create_message(me.id, "mine").unwrap();
        let theirs = db.create_message(friend.id, "theirs").unwrap();
        db.create_message(stranger.id, "noise").unwrap();

        let feed = db.home_feed(me.id, 100).unwrap();
        let ids: Vec<i64> = feed.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![theirs.id, mine.id]);
    }

    #[test]
    fn list_users_filters_by_username() {
        let db = db();
        user(&db, "alice");
        user(&db, "bob");
        user(&db, "alicia");

        let all = db.list_users(None).unwrap();
        assert_eq!(all.len(), 3);

        let names: Vec<String> = db
            .list_users(Some("ali"))
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "alicia"]);
    }

    #[test]
    fn list_users_matches_wildcards_literally() {
        let db = db();
        user(&db, "bob_smith");
        user(&db, "bobxsmith");
        user(&db, "100%real");

        let names: Vec<String> = db
            .list_users(Some("b_s"))
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["bob_smith"]);

        let names: Vec<String> = db
            .list_users(Some("%"))
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["100%real"]);
    }

    #[test]
    fn update_profile_falls_back_to_default_images() {
        let db = db();
        let u = user(&db, "testuser");

        let updated = db
            .update_profile(
                u.id,
                &ProfileUpdate {
                    username: "renamed",
                    email: "renamed@test.com",
                    image_url: Some(""),
                    header_image_url: Some("/header.png"),
                    bio: Some("hello"),
                    location: None,
                },
            )
            .unwrap();

        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(updated.header_image_url, "/header.png");
        assert_eq!(updated.bio.as_deref(), Some("hello"));
    }

    #[test]
    fn deleting_user_cascades() {
        let db = db();
        let u1 = user(&db, "leaver");
        let u2 = user(&db, "stayer");
        let own = db.create_message(u1.id, "bye").unwrap();
        let other = db.create_message(u2.id, "hi").unwrap();
        db.follow(u1.id, u2.id).unwrap();
        db.follow(u2.id, u1.id).unwrap();
        db.toggle_like(u1.id, other.id).unwrap();
        db.toggle_like(u2.id, own.id).unwrap();

        assert!(db.delete_user(u1.id).unwrap());

        assert!(db.get_message(own.id).unwrap().is_none());
        assert!(db.followers(u2.id).unwrap().is_empty());
        assert!(db.following(u2.id).unwrap().is_empty());
        assert!(db.liked_message_ids(u2.id).unwrap().is_empty());
        assert_eq!(db.user_stats(u2.id).unwrap().messages, 1);
    }
}
