//! Exercise name to demo video glossary.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::store::{StoreError, load_json, save_json};

/// Case-insensitive exercise name to URL map, persisted as JSON.
#[derive(Debug)]
pub struct ExerciseLinks {
    path: PathBuf,
    links: BTreeMap<String, String>,
}

fn normalize(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Returns true if `url` looks like something Telegram will render as a link.
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    (url.starts_with("https://") || url.starts_with("http://"))
        && url.len() > "https://".len()
        && !url.chars().any(char::is_whitespace)
}

impl ExerciseLinks {
    /// Loads the glossary, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let stored: BTreeMap<String, String> = load_json(&path)?;
        Ok(Self {
            path,
            links: stored.into_iter().map(|(k, v)| (normalize(&k), v)).collect(),
        })
    }

    /// Writes the glossary back to its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<(), StoreError> {
        save_json(&self.path, &self.links)
    }

    /// Looks up the link for an exercise name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.links.get(&normalize(name)).map(String::as_str)
    }

    /// Sets a link, returning the previous one.
    pub fn insert(&mut self, name: &str, url: &str) -> Option<String> {
        self.links.insert(normalize(name), url.to_owned())
    }

    /// Removes a link, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.links.remove(&normalize(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
