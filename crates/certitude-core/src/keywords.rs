//! Registry of uncertainty phrases.
//!
//! Phrases are stored lowercased, deduplicated, and scanned in registration
//! order. The set is owned by a gate instance and may be mutated while other
//! tasks are classifying.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Hedge phrases every default-configured gate starts with, in scan order.
pub const DEFAULT_KEYWORDS: [&str; 13] = [
    "i'm not sure",
    "need more information",
    "could you clarify",
    "not certain",
    "might be",
    "perhaps",
    "unclear",
    "ambiguous",
    "cannot determine",
    "insufficient information",
    "unable to",
    "don't know",
    "unsure",
];

/// Ordered, case-insensitive set of uncertainty phrases.
#[derive(Debug)]
pub struct KeywordSet {
    phrases: RwLock<Vec<String>>,
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self::with_phrases(DEFAULT_KEYWORDS)
    }
}

impl KeywordSet {
    /// Empty set.
    pub fn empty() -> Self {
        Self {
            phrases: RwLock::new(Vec::new()),
        }
    }

    pub fn with_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::empty();
        for phrase in phrases {
            set.add(phrase.as_ref());
        }
        set
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.phrases.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.phrases.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a phrase. Returns `false` if it was empty or already present.
    pub fn add(&self, phrase: &str) -> bool {
        let normalized = phrase.trim().to_lowercase();
        if normalized.is_empty() {
            return false;
        }
        let mut phrases = self.write();
        if phrases.contains(&normalized) {
            return false;
        }
        phrases.push(normalized);
        true
    }

    /// Remove a phrase. Returns `false` if it was not registered.
    pub fn remove(&self, phrase: &str) -> bool {
        let normalized = phrase.trim().to_lowercase();
        let mut phrases = self.write();
        let before = phrases.len();
        phrases.retain(|p| *p != normalized);
        phrases.len() != before
    }

    /// First registered phrase occurring in `text`, ignoring case.
    pub fn first_match(&self, text: &str) -> Option<String> {
        let haystack = text.to_lowercase();
        self.read()
            .iter()
            .find(|phrase| haystack.contains(phrase.as_str()))
            .cloned()
    }

    /// Current phrases in scan order.
    pub fn list(&self) -> Vec<String> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
