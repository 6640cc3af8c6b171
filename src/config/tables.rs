//! Tracked tables configuration and validation.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or editing tracked tables.
#[derive(Debug, Error)]
pub enum TablesError {
    #[error("Table at index {index} has an empty id")]
    EmptyId { index: usize },

    #[error("Table id {id:?} contains whitespace")]
    InvalidId { id: String },

    #[error("Duplicate table id found: {id}")]
    DuplicateId { id: String },

    #[error("Table {id} has no pages")]
    NoPages { id: String },

    #[error("Table {id} has an empty page name")]
    EmptyPage { id: String },

    #[error("Table {id} lists page {page:?} twice")]
    DuplicatePage { id: String, page: String },

    #[error("Failed to read tables file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse tables file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A spreadsheet and the pages (sheet tabs) holding its plans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedTable {
    /// Spreadsheet id from the sheet URL.
    pub table_id: String,

    /// Page names, each one a plan.
    pub pages: Vec<String>,
}

impl TrackedTable {
    #[must_use]
    pub fn new(table_id: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            table_id: table_id.into(),
            pages,
        }
    }

    /// Parses `"<table_id> <page>[, <page>...]"`.
    ///
    /// Pages may also be given one per line.
    #[must_use]
    pub fn parse_input(input: &str) -> Option<Self> {
        let input = input.trim();
        let (table_id, rest) = input.split_once(char::is_whitespace)?;
        let pages = rest
            .split([',', '\n'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();

        (!pages.is_empty()).then(|| Self::new(extract_table_id(table_id), pages))
    }

    fn validate(&self, index: usize) -> Result<(), TablesError> {
        if self.table_id.is_empty() {
            return Err(TablesError::EmptyId { index });
        }
        if self.table_id.chars().any(char::is_whitespace) {
            return Err(TablesError::InvalidId {
                id: self.table_id.clone(),
            });
        }
        if self.pages.is_empty() {
            return Err(TablesError::NoPages {
                id: self.table_id.clone(),
            });
        }

        let mut seen = HashSet::new();
        for page in &self.pages {
            if page.trim().is_empty() {
                return Err(TablesError::EmptyPage {
                    id: self.table_id.clone(),
                });
            }
            if !seen.insert(page) {
                return Err(TablesError::DuplicatePage {
                    id: self.table_id.clone(),
                    page: page.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Accepts either a bare id or a full `docs.google.com` URL.
pub fn extract_table_id(raw: &str) -> String {
    raw.split_once("/spreadsheets/d/")
        .map_or(raw, |(_, rest)| rest.split(['/', '?', '#']).next().unwrap_or(rest))
        .to_owned()
}

/// All tables the bot keeps refreshed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedTables {
    pub tables: Vec<TrackedTable>,
}

impl TrackedTables {
    /// Loads the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, TablesError> {
        let content = std::fs::read_to_string(path)?;
        let tables: Self = serde_json::from_str(&content)?;
        Ok(tables)
    }

    /// Loads the configuration, treating a missing file as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, TablesError> {
        match Self::load_from_file(path) {
            Err(TablesError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Saves the configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), TablesError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates every table.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), TablesError> {
        let mut seen_ids = HashSet::new();

        for (index, table) in self.tables.iter().enumerate() {
            table.validate(index)?;
            if !seen_ids.insert(&table.table_id) {
                return Err(TablesError::DuplicateId {
                    id: table.table_id.clone(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, table_id: &str) -> Option<&TrackedTable> {
        self.tables.iter().find(|t| t.table_id == table_id)
    }

    #[must_use]
    pub fn contains(&self, table_id: &str) -> bool {
        self.get(table_id).is_some()
    }

    /// Adds a table after validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is invalid or its id is already tracked.
    pub fn add_table(&mut self, table: TrackedTable) -> Result<(), TablesError> {
        table.validate(self.tables.len())?;
        if self.contains(&table.table_id) {
            return Err(TablesError::DuplicateId { id: table.table_id });
        }
        self.tables.push(table);
        Ok(())
    }

    /// Removes a table, returning it if it was tracked.
    pub fn remove_table(&mut self, table_id: &str) -> Option<TrackedTable> {
        let index = self.tables.iter().position(|t| t.table_id == table_id)?;
        Some(self.tables.remove(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Creates an example configuration for users to reference.
    #[must_use]
    pub fn example() -> Self {
        Self {
            tables: vec![TrackedTable::new(
                "1AbCdEfGhIjKlMnOpQrStUvWxYz0123456789abcdefg",
                vec!["Strength".to_owned(), "Endurance".to_owned()],
            )],
        }
    }
}
