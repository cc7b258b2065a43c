use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ToSql};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Comment, Quote, User};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe SQLite store.
///
/// Aggregates (users, quotes) carry a uuid `id` for identity and a monotonic
/// `seq` rowkey used as the pagination cursor. Like/save/follow membership
/// lives in join tables with composite primary keys, so every ledger mutation
/// is a single atomic statement and membership is at-most-once by
/// construction.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                username TEXT UNIQUE NOT NULL,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                firstname TEXT DEFAULT '',
                lastname TEXT DEFAULT '',
                display_image TEXT DEFAULT '/images/profile/default.png',
                admin INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quotes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                author_id TEXT NOT NULL,
                text TEXT NOT NULL,
                tags TEXT DEFAULT '[]',
                emotion TEXT DEFAULT 'neutral',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS comments (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                quote_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (quote_id) REFERENCES quotes(id),
                FOREIGN KEY (author_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS quote_likes (
                quote_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                PRIMARY KEY (quote_id, user_id),
                FOREIGN KEY (quote_id) REFERENCES quotes(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS comment_likes (
                comment_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                PRIMARY KEY (comment_id, user_id),
                FOREIGN KEY (comment_id) REFERENCES comments(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS quote_saves (
                user_id TEXT NOT NULL,
                quote_id TEXT NOT NULL,
                PRIMARY KEY (user_id, quote_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (quote_id) REFERENCES quotes(id)
            );

            CREATE TABLE IF NOT EXISTS follows (
                follower_id TEXT NOT NULL,
                followee_id TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id),
                FOREIGN KEY (follower_id) REFERENCES users(id),
                FOREIGN KEY (followee_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_quotes_author_id ON quotes(author_id);
            CREATE INDEX IF NOT EXISTS idx_comments_quote_id ON comments(quote_id);
            CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn create_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        let taken: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1",
                params![&user.username],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if taken {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                user.username
            )));
        }

        user.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;
        if user.display_image.is_empty() {
            user.display_image = crate::models::DEFAULT_DISPLAY_IMAGE.to_string();
        }

        conn.execute(
            r#"INSERT INTO users (id, username, email, password_hash, firstname, lastname,
                display_image, admin, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                &user.id,
                &user.username,
                &user.email,
                &user.password_hash,
                &user.firstname,
                &user.lastname,
                &user.display_image,
                user.admin,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        user.seq = conn.last_insert_rowid();
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        user_by_id(&conn, id)
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        let mut user = conn
            .query_row(
                "SELECT * FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::NotFound(format!("User {}", username))
                }
                _ => StoreError::Database(e),
            })?;
        load_user_relations(&conn, &mut user)?;
        Ok(user)
    }

    /// Load the users for the given ids into a map keyed by id.
    ///
    /// Missing ids are skipped rather than erroring so projections can
    /// tolerate content whose author has since been deleted.
    pub fn get_users_map(&self, ids: &[String]) -> StoreResult<HashMap<String, User>> {
        let conn = self.conn.lock().unwrap();
        let mut users = HashMap::new();
        for id in ids {
            if users.contains_key(id) {
                continue;
            }
            match user_by_id(&conn, id) {
                Ok(user) => {
                    users.insert(id.clone(), user);
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(users)
    }

    pub fn list_users(&self) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY seq ASC")?;
        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        for user in &mut users {
            load_user_relations(&conn, user)?;
        }
        Ok(users)
    }

    /// Cursor-paginated user listing, ordered by creation sequence ascending.
    /// `after_seq` selects strictly newer rows than the cursor; a stale
    /// cursor is purely positional and never errors.
    pub fn page_users(&self, after_seq: Option<i64>, limit: i64) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut users = Vec::new();

        if let Some(after) = after_seq {
            let mut stmt =
                conn.prepare("SELECT * FROM users WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2")?;
            let rows = stmt.query_map(params![after, limit], row_to_user)?;
            for row in rows {
                users.push(row?);
            }
        } else {
            let mut stmt = conn.prepare("SELECT * FROM users ORDER BY seq ASC LIMIT ?1")?;
            let rows = stmt.query_map(params![limit], row_to_user)?;
            for row in rows {
                users.push(row?);
            }
        }

        for user in &mut users {
            load_user_relations(&conn, user)?;
        }
        Ok(users)
    }

    pub fn username_taken(&self, username: &str, exclude_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1 AND id != ?2",
            params![username, exclude_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        user.updated_at = Utc::now();

        let rows = conn.execute(
            r#"UPDATE users SET username = ?1, firstname = ?2, lastname = ?3,
               display_image = ?4, password_hash = ?5, updated_at = ?6 WHERE id = ?7"#,
            params![
                &user.username,
                &user.firstname,
                &user.lastname,
                &user.display_image,
                &user.password_hash,
                user.updated_at.to_rfc3339(),
                &user.id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("User {}", user.id)));
        }
        Ok(())
    }

    pub fn delete_user(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM follows WHERE follower_id = ?1 OR followee_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM quote_saves WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM quote_likes WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM comment_likes WHERE user_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        tx.commit()?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("User {}", id)));
        }
        Ok(())
    }

    /// Administrative bulk deletion. Returns the number of users removed.
    pub fn delete_all_users(&self) -> StoreResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM follows", [])?;
        tx.execute("DELETE FROM quote_saves", [])?;
        tx.execute("DELETE FROM quote_likes", [])?;
        tx.execute("DELETE FROM comment_likes", [])?;
        let count = tx.execute("DELETE FROM users", [])?;
        tx.commit()?;
        Ok(count)
    }

    /// Random user suggestions, excluding the given ids.
    pub fn random_users(&self, exclude: &[String], size: i64) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; exclude.len()].join(", ");
        let sql = if exclude.is_empty() {
            "SELECT * FROM users ORDER BY RANDOM() LIMIT ?".to_string()
        } else {
            format!(
                "SELECT * FROM users WHERE id NOT IN ({}) ORDER BY RANDOM() LIMIT ?",
                placeholders
            )
        };

        let mut sql_params: Vec<&dyn ToSql> = Vec::new();
        for id in exclude {
            sql_params.push(id);
        }
        sql_params.push(&size);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(sql_params.as_slice(), row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        for user in &mut users {
            load_user_relations(&conn, user)?;
        }
        Ok(users)
    }

    pub fn search_users(&self, term: &str) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", term);
        let mut stmt = conn.prepare(
            r#"SELECT * FROM users
               WHERE username LIKE ?1 OR firstname LIKE ?1 OR lastname LIKE ?1
               ORDER BY seq ASC"#,
        )?;
        let rows = stmt.query_map(params![pattern], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        for user in &mut users {
            load_user_relations(&conn, user)?;
        }
        Ok(users)
    }

    // ==================== Social Graph Operations ====================

    /// Establish the follow relation. A single relation row backs both the
    /// follower's `following` set and the followee's `followers` set, so the
    /// two sides can never diverge. Idempotent.
    pub fn follow(&self, follower_id: &str, followee_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        ensure_user(&conn, follower_id)?;
        ensure_user(&conn, followee_id)?;
        conn.execute(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
            params![follower_id, followee_id],
        )?;
        Ok(())
    }

    /// Remove the follow relation. Removing an absent relation is a no-op.
    pub fn unfollow(&self, follower_id: &str, followee_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        ensure_user(&conn, follower_id)?;
        ensure_user(&conn, followee_id)?;
        conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower_id, followee_id],
        )?;
        Ok(())
    }

    pub fn is_following(&self, viewer_id: &str, target_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![viewer_id, target_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ==================== Quote Operations ====================

    pub fn create_quote(&self, quote: &mut Quote) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        quote.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        quote.created_at = now;
        quote.updated_at = now;
        if quote.emotion.is_empty() {
            quote.emotion = "neutral".to_string();
        }

        let tags_json = serde_json::to_string(&quote.tags)?;

        conn.execute(
            r#"INSERT INTO quotes (id, author_id, text, tags, emotion, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &quote.id,
                &quote.author_id,
                &quote.text,
                &tags_json,
                &quote.emotion,
                quote.created_at.to_rfc3339(),
                quote.updated_at.to_rfc3339(),
            ],
        )?;
        quote.seq = conn.last_insert_rowid();
        Ok(())
    }

    pub fn get_quote(&self, id: &str) -> StoreResult<Quote> {
        let conn = self.conn.lock().unwrap();
        quote_by_id(&conn, id)
    }

    pub fn update_quote(&self, quote: &mut Quote) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        quote.updated_at = Utc::now();
        let tags_json = serde_json::to_string(&quote.tags)?;

        let rows = conn.execute(
            r#"UPDATE quotes SET text = ?1, tags = ?2, emotion = ?3, updated_at = ?4
               WHERE id = ?5"#,
            params![
                &quote.text,
                &tags_json,
                &quote.emotion,
                quote.updated_at.to_rfc3339(),
                &quote.id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Quote {}", quote.id)));
        }
        Ok(())
    }

    pub fn delete_quote(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM comment_likes WHERE comment_id IN (SELECT id FROM comments WHERE quote_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM comments WHERE quote_id = ?1", params![id])?;
        tx.execute("DELETE FROM quote_likes WHERE quote_id = ?1", params![id])?;
        tx.execute("DELETE FROM quote_saves WHERE quote_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM quotes WHERE id = ?1", params![id])?;
        tx.commit()?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Quote {}", id)));
        }
        Ok(())
    }

    /// Administrative bulk deletion. Returns the number of quotes removed.
    pub fn delete_all_quotes(&self) -> StoreResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM comment_likes", [])?;
        tx.execute("DELETE FROM comments", [])?;
        tx.execute("DELETE FROM quote_likes", [])?;
        tx.execute("DELETE FROM quote_saves", [])?;
        let count = tx.execute("DELETE FROM quotes", [])?;
        tx.commit()?;
        Ok(count)
    }

    pub fn list_quotes(
        &self,
        emotion: Option<&str>,
        author_id: Option<&str>,
    ) -> StoreResult<Vec<Quote>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = "SELECT * FROM quotes".to_string();
        let mut clauses = Vec::new();
        let mut sql_params: Vec<&dyn ToSql> = Vec::new();
        if let Some(ref e) = emotion {
            clauses.push("emotion = ?");
            sql_params.push(e);
        }
        if let Some(ref a) = author_id {
            clauses.push("author_id = ?");
            sql_params.push(a);
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY seq DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(sql_params.as_slice(), row_to_quote)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }
        for quote in &mut quotes {
            load_quote_children(&conn, quote)?;
        }
        Ok(quotes)
    }

    /// Newest quotes regardless of author, for the unauthenticated preview.
    pub fn latest_quotes(&self, limit: i64) -> StoreResult<Vec<Quote>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM quotes ORDER BY seq DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], row_to_quote)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }
        for quote in &mut quotes {
            load_quote_children(&conn, quote)?;
        }
        Ok(quotes)
    }

    /// Reverse-chronological feed of quotes authored by any of `author_ids`.
    /// `before_seq` selects strictly older rows than the cursor; a stale
    /// cursor is purely positional and never errors.
    pub fn feed_quotes(
        &self,
        author_ids: &[String],
        before_seq: Option<i64>,
        limit: i64,
    ) -> StoreResult<Vec<Quote>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; author_ids.len()].join(", ");
        let sql = if before_seq.is_some() {
            format!(
                "SELECT * FROM quotes WHERE seq < ? AND author_id IN ({}) ORDER BY seq DESC LIMIT ?",
                placeholders
            )
        } else {
            format!(
                "SELECT * FROM quotes WHERE author_id IN ({}) ORDER BY seq DESC LIMIT ?",
                placeholders
            )
        };

        let mut sql_params: Vec<&dyn ToSql> = Vec::new();
        if let Some(ref before) = before_seq {
            sql_params.push(before);
        }
        for id in author_ids {
            sql_params.push(id);
        }
        sql_params.push(&limit);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(sql_params.as_slice(), row_to_quote)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }
        for quote in &mut quotes {
            load_quote_children(&conn, quote)?;
        }
        Ok(quotes)
    }

    pub fn search_quotes(&self, term: &str) -> StoreResult<Vec<Quote>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", term);
        let mut stmt = conn.prepare(
            r#"SELECT * FROM quotes
               WHERE text LIKE ?1 OR tags LIKE ?1 OR emotion LIKE ?1
               ORDER BY seq DESC"#,
        )?;
        let rows = stmt.query_map(params![pattern], row_to_quote)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }
        for quote in &mut quotes {
            load_quote_children(&conn, quote)?;
        }
        Ok(quotes)
    }

    // ==================== Engagement Ledger: Likes ====================

    /// Add `user_id` to the quote's like set. A no-op if already present;
    /// the insert is a single atomic statement, so concurrent likes by
    /// distinct users cannot lose each other. Returns the updated aggregate.
    pub fn like_quote(&self, quote_id: &str, user_id: &str) -> StoreResult<Quote> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        conn.execute(
            "INSERT OR IGNORE INTO quote_likes (quote_id, user_id) VALUES (?1, ?2)",
            params![quote_id, user_id],
        )?;
        quote_by_id(&conn, quote_id)
    }

    /// Remove `user_id` from the quote's like set unconditionally.
    pub fn unlike_quote(&self, quote_id: &str, user_id: &str) -> StoreResult<Quote> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        conn.execute(
            "DELETE FROM quote_likes WHERE quote_id = ?1 AND user_id = ?2",
            params![quote_id, user_id],
        )?;
        quote_by_id(&conn, quote_id)
    }

    pub fn is_quote_liked(&self, quote_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM quote_likes WHERE quote_id = ?1 AND user_id = ?2",
            params![quote_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Like an embedded comment. Same semantics as quote likes; the mutation
    /// targets the parent quote's comment rows.
    pub fn like_comment(
        &self,
        quote_id: &str,
        comment_id: &str,
        user_id: &str,
    ) -> StoreResult<Comment> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        ensure_comment(&conn, quote_id, comment_id)?;
        conn.execute(
            "INSERT OR IGNORE INTO comment_likes (comment_id, user_id) VALUES (?1, ?2)",
            params![comment_id, user_id],
        )?;
        comment_by_id(&conn, quote_id, comment_id)
    }

    pub fn unlike_comment(
        &self,
        quote_id: &str,
        comment_id: &str,
        user_id: &str,
    ) -> StoreResult<Comment> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        ensure_comment(&conn, quote_id, comment_id)?;
        conn.execute(
            "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
            params![comment_id, user_id],
        )?;
        comment_by_id(&conn, quote_id, comment_id)
    }

    // ==================== Engagement Ledger: Saves ====================

    /// Add the quote to the user's saved set. Idempotent.
    pub fn save_quote(&self, user_id: &str, quote_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        conn.execute(
            "INSERT OR IGNORE INTO quote_saves (user_id, quote_id) VALUES (?1, ?2)",
            params![user_id, quote_id],
        )?;
        Ok(())
    }

    /// Remove the quote from the user's saved set unconditionally.
    pub fn unsave_quote(&self, user_id: &str, quote_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        conn.execute(
            "DELETE FROM quote_saves WHERE user_id = ?1 AND quote_id = ?2",
            params![user_id, quote_id],
        )?;
        Ok(())
    }

    pub fn is_quote_saved(&self, user_id: &str, quote_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM quote_saves WHERE user_id = ?1 AND quote_id = ?2",
            params![user_id, quote_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// The quotes a user has saved, in save order.
    pub fn saved_quotes(&self, user_id: &str) -> StoreResult<Vec<Quote>> {
        let conn = self.conn.lock().unwrap();
        ensure_user(&conn, user_id)?;
        let mut stmt = conn.prepare(
            r#"SELECT q.* FROM quotes q
               JOIN quote_saves s ON s.quote_id = q.id
               WHERE s.user_id = ?1
               ORDER BY s.rowid ASC"#,
        )?;
        let rows = stmt.query_map(params![user_id], row_to_quote)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }
        for quote in &mut quotes {
            load_quote_children(&conn, quote)?;
        }
        Ok(quotes)
    }

    /// Empty the user's saved set. Returns the number of entries removed.
    pub fn clear_saved(&self, user_id: &str) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        ensure_user(&conn, user_id)?;
        let count = conn.execute("DELETE FROM quote_saves WHERE user_id = ?1", params![user_id])?;
        Ok(count)
    }

    // ==================== Comment Operations ====================

    /// Append a comment to its quote, preserving insertion order.
    pub fn add_comment(&self, comment: &mut Comment) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, &comment.quote_id)?;
        comment.id = Uuid::new_v4().to_string();
        comment.created_at = Utc::now();

        conn.execute(
            r#"INSERT INTO comments (id, quote_id, author_id, text, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                &comment.id,
                &comment.quote_id,
                &comment.author_id,
                &comment.text,
                comment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_comment(&self, quote_id: &str, comment_id: &str) -> StoreResult<Comment> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        comment_by_id(&conn, quote_id, comment_id)
    }

    pub fn comments_for_quote(&self, quote_id: &str) -> StoreResult<Vec<Comment>> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        comments_of(&conn, quote_id)
    }

    pub fn update_comment_text(
        &self,
        quote_id: &str,
        comment_id: &str,
        text: &str,
    ) -> StoreResult<Comment> {
        let conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        let rows = conn.execute(
            "UPDATE comments SET text = ?1 WHERE id = ?2 AND quote_id = ?3",
            params![text, comment_id, quote_id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("Comment {}", comment_id)));
        }
        comment_by_id(&conn, quote_id, comment_id)
    }

    pub fn delete_comment(&self, quote_id: &str, comment_id: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM comment_likes WHERE comment_id = ?1",
            params![comment_id],
        )?;
        let rows = tx.execute(
            "DELETE FROM comments WHERE id = ?1 AND quote_id = ?2",
            params![comment_id, quote_id],
        )?;
        tx.commit()?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Comment {}", comment_id)));
        }
        Ok(())
    }

    /// Administrative: empty the quote's comment collection. Returns the
    /// updated aggregate.
    pub fn clear_comments(&self, quote_id: &str) -> StoreResult<Quote> {
        let mut conn = self.conn.lock().unwrap();
        ensure_quote(&conn, quote_id)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM comment_likes WHERE comment_id IN (SELECT id FROM comments WHERE quote_id = ?1)",
            params![quote_id],
        )?;
        tx.execute("DELETE FROM comments WHERE quote_id = ?1", params![quote_id])?;
        tx.commit()?;
        quote_by_id(&conn, quote_id)
    }
}

// ==================== Row mapping helpers ====================

fn ensure_user(conn: &Connection, id: &str) -> StoreResult<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(StoreError::NotFound(format!("User {}", id)));
    }
    Ok(())
}

fn ensure_quote(conn: &Connection, id: &str) -> StoreResult<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM quotes WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(StoreError::NotFound(format!("Quote {}", id)));
    }
    Ok(())
}

fn ensure_comment(conn: &Connection, quote_id: &str, comment_id: &str) -> StoreResult<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE id = ?1 AND quote_id = ?2",
        params![comment_id, quote_id],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(StoreError::NotFound(format!("Comment {}", comment_id)));
    }
    Ok(())
}

fn user_by_id(conn: &Connection, id: &str) -> StoreResult<User> {
    let mut user = conn
        .query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("User {}", id)),
            _ => StoreError::Database(e),
        })?;
    load_user_relations(conn, &mut user)?;
    Ok(user)
}

fn quote_by_id(conn: &Connection, id: &str) -> StoreResult<Quote> {
    let mut quote = conn
        .query_row(
            "SELECT * FROM quotes WHERE id = ?1",
            params![id],
            row_to_quote,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("Quote {}", id)),
            _ => StoreError::Database(e),
        })?;
    load_quote_children(conn, &mut quote)?;
    Ok(quote)
}

fn comment_by_id(conn: &Connection, quote_id: &str, comment_id: &str) -> StoreResult<Comment> {
    let mut comment = conn
        .query_row(
            "SELECT * FROM comments WHERE id = ?1 AND quote_id = ?2",
            params![comment_id, quote_id],
            row_to_comment,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("Comment {}", comment_id))
            }
            _ => StoreError::Database(e),
        })?;
    comment.likes = comment_likes(conn, &comment.id)?;
    Ok(comment)
}

fn comments_of(conn: &Connection, quote_id: &str) -> StoreResult<Vec<Comment>> {
    let mut stmt =
        conn.prepare("SELECT * FROM comments WHERE quote_id = ?1 ORDER BY seq ASC")?;
    let rows = stmt.query_map(params![quote_id], row_to_comment)?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    for comment in &mut comments {
        comment.likes = comment_likes(conn, &comment.id)?;
    }
    Ok(comments)
}

fn comment_likes(conn: &Connection, comment_id: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM comment_likes WHERE comment_id = ?1 ORDER BY rowid ASC")?;
    let rows = stmt.query_map(params![comment_id], |row| row.get(0))?;

    let mut likes = Vec::new();
    for row in rows {
        likes.push(row?);
    }
    Ok(likes)
}

fn load_quote_children(conn: &Connection, quote: &mut Quote) -> StoreResult<()> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM quote_likes WHERE quote_id = ?1 ORDER BY rowid ASC")?;
    let rows = stmt.query_map(params![&quote.id], |row| row.get(0))?;
    quote.likes.clear();
    for row in rows {
        quote.likes.push(row?);
    }
    quote.comments = comments_of(conn, &quote.id)?;
    Ok(())
}

fn load_user_relations(conn: &Connection, user: &mut User) -> StoreResult<()> {
    let mut stmt = conn
        .prepare("SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY rowid ASC")?;
    let rows = stmt.query_map(params![&user.id], |row| row.get(0))?;
    user.following.clear();
    for row in rows {
        user.following.push(row?);
    }

    let mut stmt = conn
        .prepare("SELECT follower_id FROM follows WHERE followee_id = ?1 ORDER BY rowid ASC")?;
    let rows = stmt.query_map(params![&user.id], |row| row.get(0))?;
    user.followers.clear();
    for row in rows {
        user.followers.push(row?);
    }

    let mut stmt =
        conn.prepare("SELECT quote_id FROM quote_saves WHERE user_id = ?1 ORDER BY rowid ASC")?;
    let rows = stmt.query_map(params![&user.id], |row| row.get(0))?;
    user.saved.clear();
    for row in rows {
        user.saved.push(row?);
    }
    Ok(())
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        seq: row.get("seq")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        firstname: row.get("firstname")?,
        lastname: row.get("lastname")?,
        display_image: row.get("display_image")?,
        admin: row.get("admin")?,
        following: Vec::new(),
        followers: Vec::new(),
        saved: Vec::new(),
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_quote(row: &rusqlite::Row) -> rusqlite::Result<Quote> {
    let tags_json: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

    Ok(Quote {
        id: row.get("id")?,
        seq: row.get("seq")?,
        text: row.get("text")?,
        tags,
        emotion: row.get("emotion")?,
        author_id: row.get("author_id")?,
        likes: Vec::new(),
        comments: Vec::new(),
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        quote_id: row.get("quote_id")?,
        author_id: row.get("author_id")?,
        text: row.get("text")?,
        likes: Vec::new(),
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
