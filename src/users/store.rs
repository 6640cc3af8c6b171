//! Per-user access flags and plan position, persisted as JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from the JSON-backed stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads a JSON map, treating a missing file as empty.
pub(super) fn load_json<T>(path: &Path) -> Result<T, StoreError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_owned(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} not found, starting empty", path.display());
            Ok(T::default())
        }
        Err(source) => Err(StoreError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}

pub(super) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Parse {
        path: path.to_owned(),
        source,
    })?;
    std::fs::write(path, content).map_err(|source| StoreError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Everything the bot remembers about one Telegram user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,

    /// Telegram username or display name, for admin listings.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub authorized: bool,

    #[serde(default)]
    pub blocked: bool,

    /// Assigned spreadsheet.
    #[serde(default)]
    pub table_id: Option<String>,

    /// Selected plan (page) within the table.
    #[serde(default)]
    pub plan: Option<String>,

    /// 1-based week number.
    #[serde(default)]
    pub week: Option<usize>,

    /// 1-based actual workout number within the week.
    #[serde(default)]
    pub workout: Option<usize>,
}

impl UserRecord {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Returns true if the user may use plan commands.
    #[must_use]
    pub const fn has_access(&self) -> bool {
        self.authorized && !self.blocked
    }

    /// Forgets the plan position.
    pub fn reset_position(&mut self) {
        self.plan = None;
        self.week = None;
        self.workout = None;
    }
}

/// All known users, keyed by Telegram id.
#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    users: BTreeMap<i64, UserRecord>,
}

impl UserStore {
    /// Loads the store, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let users: Vec<UserRecord> = load_json(&path)?;
        Ok(Self {
            path,
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        })
    }

    /// Writes the store back to its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<(), StoreError> {
        let users: Vec<&UserRecord> = self.users.values().collect();
        save_json(&self.path, &users)
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&UserRecord> {
        self.users.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut UserRecord> {
        self.users.get_mut(&id)
    }

    /// Returns the user, creating an empty record on first contact.
    pub fn get_or_insert(&mut self, id: i64) -> &mut UserRecord {
        self.users.entry(id).or_insert_with(|| UserRecord::new(id))
    }

    /// Grants access. Returns false if the user was already authorized.
    pub fn authorize(&mut self, id: i64) -> bool {
        let user = self.get_or_insert(id);
        let changed = !user.authorized || user.blocked;
        user.authorized = true;
        user.blocked = false;
        changed
    }

    /// Sets the blocked flag. Returns false if it was already set that way.
    pub fn set_blocked(&mut self, id: i64, blocked: bool) -> bool {
        let user = self.get_or_insert(id);
        let changed = user.blocked != blocked;
        user.blocked = blocked;
        changed
    }

    /// Assigns a table and resets the user's position in it.
    pub fn assign_table(&mut self, id: i64, table_id: &str) {
        let user = self.get_or_insert(id);
        user.table_id = Some(table_id.to_owned());
        user.reset_position();
    }

    /// Detaches every user from a table. Returns how many were affected.
    pub fn unassign_table(&mut self, table_id: &str) -> usize {
        let mut count = 0;
        for user in self.users.values_mut() {
            if user.table_id.as_deref() == Some(table_id) {
                user.table_id = None;
                user.reset_position();
                count += 1;
            }
        }
        count
    }

    /// Iterates over all users ordered by id.
    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
