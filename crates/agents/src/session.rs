//! Per-thread conversation state and checkpointing.

use crate::types::{ChatMessage, ChatRole};
use benebot_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Conversation state for one thread.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub thread_id: String,
    pub messages: Vec<ChatMessage>,
    pub last_route: Option<String>,
    pub elapsed_secs: f64,
}

impl Session {
    pub fn new(thread_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            ..Self::default()
        }
    }
}

/// Metadata recorded with each appended turn.
#[derive(Debug, Clone, Default)]
pub struct TurnMeta {
    pub route: Option<String>,
    pub elapsed_secs: f64,
}

/// Durable per-thread history.
pub trait SessionStore: Send + Sync {
    /// Load a thread's session; `None` when the thread is unknown.
    fn load(&self, thread_id: &str) -> AppResult<Option<Session>>;

    /// Append one completed turn (user message plus assistant reply).
    fn append(
        &self,
        thread_id: &str,
        user: &ChatMessage,
        assistant: &ChatMessage,
        meta: &TurnMeta,
    ) -> AppResult<()>;
}

/// SQLite-backed session store.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Session(format!("Failed to create checkpoint directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Session(format!("Failed to open checkpoint db: {}", e)))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Session(format!("Failed to open checkpoint db: {}", e)))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> AppResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                route TEXT,
                elapsed REAL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, id);
            "#,
        )
        .map_err(|e| AppError::Session(format!("Failed to create tables: {}", e)))
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Session("Checkpoint lock poisoned".to_string()))
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, thread_id: &str) -> AppResult<Option<Session>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT role, content, route, elapsed FROM messages
                 WHERE thread_id = ?1 ORDER BY id ASC",
            )
            .map_err(|e| AppError::Session(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![thread_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })
            .map_err(|e| AppError::Session(format!("Failed to query messages: {}", e)))?;

        let mut session = Session::new(thread_id);
        let mut any = false;
        for row in rows {
            let (role, content, route, elapsed) =
                row.map_err(|e| AppError::Session(format!("Failed to read message: {}", e)))?;
            any = true;
            let role = match role.as_str() {
                "user" => ChatRole::User,
                _ => ChatRole::Assistant,
            };
            session.messages.push(ChatMessage { role, content });
            if let Some(route) = route {
                session.last_route = Some(route);
            }
            if let Some(elapsed) = elapsed {
                session.elapsed_secs = elapsed;
            }
        }

        Ok(any.then_some(session))
    }

    fn append(
        &self,
        thread_id: &str,
        user: &ChatMessage,
        assistant: &ChatMessage,
        meta: &TurnMeta,
    ) -> AppResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Session(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO messages (thread_id, role, content, route, elapsed, created_at)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4)",
            params![thread_id, user.role.as_str(), user.content, now],
        )
        .map_err(|e| AppError::Session(format!("Failed to insert message: {}", e)))?;

        tx.execute(
            "INSERT INTO messages (thread_id, role, content, route, elapsed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                thread_id,
                assistant.role.as_str(),
                assistant.content,
                meta.route,
                meta.elapsed_secs,
                now
            ],
        )
        .map_err(|e| AppError::Session(format!("Failed to insert message: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Session(format!("Failed to commit turn: {}", e)))
    }
}

/// In-memory session store, used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, thread_id: &str) -> AppResult<Option<Session>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| AppError::Session("Session lock poisoned".to_string()))?;
        Ok(sessions.get(thread_id).cloned())
    }

    fn append(
        &self,
        thread_id: &str,
        user: &ChatMessage,
        assistant: &ChatMessage,
        meta: &TurnMeta,
    ) -> AppResult<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| AppError::Session("Session lock poisoned".to_string()))?;
        let session = sessions
            .entry(thread_id.to_string())
            .or_insert_with(|| Session::new(thread_id));
        session.messages.push(user.clone());
        session.messages.push(assistant.clone());
        session.last_route = meta.route.clone();
        session.elapsed_secs = meta.elapsed_secs;
        Ok(())
    }
}

/// Build a short transcript block from message history.
///
/// Keeps the last `turns` user/assistant pairs, rendered most recent
/// first. Returns "(none)" when there are no complete pairs.
pub fn history_block(messages: &[ChatMessage], turns: usize) -> String {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    let mut last_user: Option<&str> = None;
    for message in messages {
        match message.role {
            ChatRole::User => last_user = Some(&message.content),
            ChatRole::Assistant => {
                if let Some(user) = last_user.take() {
                    pairs.push((user, &message.content));
                }
            }
        }
    }

    let recent = &pairs[pairs.len().saturating_sub(turns)..];
    let lines: Vec<String> = recent
        .iter()
        .rev()
        .map(|(u, a)| format!("User: {}\nAssistant: {}", u, a))
        .collect();

    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_block_empty() {
        assert_eq!(history_block(&[], 4), "(none)");
    }

    #[test]
    fn test_history_block_unpaired_user_ignored() {
        let messages = vec![ChatMessage::user("hello")];
        assert_eq!(history_block(&messages, 4), "(none)");
    }

    #[test]
    fn test_history_block_most_recent_first() {
        let messages = vec![
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
            ChatMessage::assistant("a2"),
        ];
        let block = history_block(&messages, 4);
        let q2_pos = block.find("q2").unwrap();
        let q1_pos = block.find("q1").unwrap();
        assert!(q2_pos < q1_pos);
    }

    #[test]
    fn test_history_block_window() {
        let mut messages = Vec::new();
        for i in 0..6 {
            messages.push(ChatMessage::user(format!("q{}", i)));
            messages.push(ChatMessage::assistant(format!("a{}", i)));
        }
        let block = history_block(&messages, 2);
        assert!(block.contains("q5"));
        assert!(block.contains("q4"));
        assert!(!block.contains("q3"));
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let store = SqliteSessionStore::in_memory().unwrap();
        assert!(store.load("t1").unwrap().is_none());

        store
            .append(
                "t1",
                &ChatMessage::user("what is my copay"),
                &ChatMessage::assistant("Your specialist copay is $40."),
                &TurnMeta {
                    route: Some("pdf".to_string()),
                    elapsed_secs: 1.25,
                },
            )
            .unwrap();

        let session = store.load("t1").unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, ChatRole::User);
        assert_eq!(session.last_route.as_deref(), Some("pdf"));
        assert!((session.elapsed_secs - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_sqlite_store_isolates_threads() {
        let store = SqliteSessionStore::in_memory().unwrap();
        store
            .append(
                "t1",
                &ChatMessage::user("q"),
                &ChatMessage::assistant("a"),
                &TurnMeta::default(),
            )
            .unwrap();

        assert!(store.load("t2").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_appends() {
        let store = MemorySessionStore::new();
        store
            .append(
                "t1",
                &ChatMessage::user("q1"),
                &ChatMessage::assistant("a1"),
                &TurnMeta::default(),
            )
            .unwrap();
        store
            .append(
                "t1",
                &ChatMessage::user("q2"),
                &ChatMessage::assistant("a2"),
                &TurnMeta::default(),
            )
            .unwrap();

        let session = store.load("t1").unwrap().unwrap();
        assert_eq!(session.messages.len(), 4);
    }
}
