//! Thought store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load lexeme and parent records by key for lazy fetches.
//! - Persist the changed records of one reduction atomically.
//!
//! # Invariants
//! - Every row is keyed by the hash of its own record; a mismatch on read is
//!   reported as invalid data instead of being returned.
//! - A missing row is reported as `record: None`, never as an empty record.
//! - `apply_delta` writes all records of a delta or none of them.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::index::IndexDelta;
use crate::model::hash::hash_thought;
use crate::model::lexeme::Lexeme;
use crate::model::parent::Parent;
use crate::model::path::Context;
use crate::state::{FetchRequest, FetchResult, FetchedLexeme, FetchedParent};
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from thought persistence.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Record body could not be encoded or decoded.
    Encode(serde_json::Error),
    /// Persisted data does not match its key.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// The store cannot serve requests right now.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "record encoding failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted thought data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "thought store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "thought store requires table `{table}`")
            }
            Self::Unavailable(message) => write!(f, "thought store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Persistence collaborator for the thought index.
pub trait ThoughtStore {
    /// Loads the parent record of every context; absent rows yield `None`.
    fn load_parents(&self, contexts: &[Context]) -> StoreResult<Vec<FetchedParent>>;
    /// Loads the lexeme of every value; absent rows yield `None`.
    fn load_lexemes(&self, values: &[String]) -> StoreResult<Vec<FetchedLexeme>>;
    /// Writes every record of `delta`; `None` entries are deleted.
    fn apply_delta(&mut self, delta: &IndexDelta) -> StoreResult<()>;

    /// Serves a whole fetch request.
    fn fetch(&self, request: &FetchRequest) -> StoreResult<FetchResult> {
        Ok(FetchResult {
            parents: self.load_parents(&request.contexts)?,
            lexemes: self.load_lexemes(&request.values)?,
        })
    }

    /// Loads both root records.
    fn load_roots(&self) -> StoreResult<FetchResult> {
        Ok(FetchResult {
            parents: self.load_parents(&[Context::root(), Context::absolute()])?,
            lexemes: Vec::new(),
        })
    }
}

/// SQLite-backed thought store.
pub struct SqliteThoughtStore<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteThoughtStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ThoughtStore for SqliteThoughtStore<'_> {
    fn load_parents(&self, contexts: &[Context]) -> StoreResult<Vec<FetchedParent>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT body FROM parents WHERE hash = ?1;")?;
        let mut fetched = Vec::with_capacity(contexts.len());
        for context in contexts {
            let context = context.canonical();
            let key = context.hash();
            let body: Option<String> = stmt
                .query_row([key.to_hex()], |row| row.get(0))
                .optional()?;
            let record = match body {
                Some(body) => {
                    let parent: Parent = serde_json::from_str(&body)?;
                    if parent.hash() != key {
                        return Err(StoreError::InvalidData(format!(
                            "parent row {key} holds context {}",
                            parent.context
                        )));
                    }
                    Some(parent)
                }
                None => None,
            };
            fetched.push(FetchedParent { context, record });
        }
        debug!(
            "event=store_load module=repo status=ok kind=parents count={}",
            fetched.len()
        );
        Ok(fetched)
    }

    fn load_lexemes(&self, values: &[String]) -> StoreResult<Vec<FetchedLexeme>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT body FROM lexemes WHERE hash = ?1;")?;
        let mut fetched = Vec::with_capacity(values.len());
        for value in values {
            let key = hash_thought(value);
            let body: Option<String> = stmt
                .query_row([key.to_hex()], |row| row.get(0))
                .optional()?;
            let record = match body {
                Some(body) => {
                    let lexeme: Lexeme = serde_json::from_str(&body)?;
                    if lexeme.hash() != key {
                        return Err(StoreError::InvalidData(format!(
                            "lexeme row {key} holds value `{}`",
                            lexeme.value
                        )));
                    }
                    Some(lexeme)
                }
                None => None,
            };
            fetched.push(FetchedLexeme {
                value: value.clone(),
                record,
            });
        }
        debug!(
            "event=store_load module=repo status=ok kind=lexemes count={}",
            fetched.len()
        );
        Ok(fetched)
    }

    fn apply_delta(&mut self, delta: &IndexDelta) -> StoreResult<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (key, record) in &delta.lexemes {
            match record {
                Some(lexeme) => {
                    tx.execute(
                        "INSERT INTO lexemes (hash, value, body, updated_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(hash) DO UPDATE SET
                            value = excluded.value,
                            body = excluded.body,
                            updated_at = excluded.updated_at;",
                        params![
                            key.to_hex(),
                            lexeme.value.as_str(),
                            serde_json::to_string(lexeme)?,
                            lexeme.last_updated
                        ],
                    )?;
                }
                None => {
                    tx.execute("DELETE FROM lexemes WHERE hash = ?1;", [key.to_hex()])?;
                }
            }
        }
        for (key, record) in &delta.parents {
            match record {
                Some(parent) => {
                    tx.execute(
                        "INSERT INTO parents (hash, context, body, updated_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(hash) DO UPDATE SET
                            context = excluded.context,
                            body = excluded.body,
                            updated_at = excluded.updated_at;",
                        params![
                            key.to_hex(),
                            serde_json::to_string(&parent.context)?,
                            serde_json::to_string(parent)?,
                            parent.last_updated
                        ],
                    )?;
                }
                None => {
                    tx.execute("DELETE FROM parents WHERE hash = ?1;", [key.to_hex()])?;
                }
            }
        }
        tx.commit().map_err(|err| {
            error!("event=store_apply module=repo status=error error={err}");
            err
        })?;
        debug!(
            "event=store_apply module=repo status=ok lexemes={} parents={}",
            delta.lexemes.len(),
            delta.parents.len()
        );
        Ok(())
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    for table in ["lexemes", "parents"] {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
