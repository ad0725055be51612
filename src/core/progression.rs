//! Character progression lookup used by `[IF: role >= level]`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::core::config::ConfigError;

/// Read access to stored character levels. The interpreter only reads.
pub trait ProgressionLookup {
    /// `None` when the role has no stored value.
    fn level(&self, role: &str) -> Option<i32>;
}

impl ProgressionLookup for HashMap<String, i32> {
    fn level(&self, role: &str) -> Option<i32> {
        self.get(role).copied()
    }
}

impl<T: ProgressionLookup + ?Sized> ProgressionLookup for &T {
    fn level(&self, role: &str) -> Option<i32> {
        (**self).level(role)
    }
}

/// In-memory `role -> level` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterLevels {
    levels: FxHashMap<String, i32>,
}

impl CharacterLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, role: impl Into<String>, level: i32) {
        self.levels.insert(role.into(), level);
    }

    /// Add `delta` to a role's level, starting from 0. Returns the new level.
    pub fn adjust(&mut self, role: &str, delta: i32) -> i32 {
        let level = self.levels.entry(role.to_string()).or_insert(0);
        *level = level.saturating_add(delta);
        *level
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Load a RON map such as `{"Mio": 3, "Ren": 1}`.
    pub fn load_from_ron(path: &Path) -> Result<CharacterLevels, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<CharacterLevels, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

impl ProgressionLookup for CharacterLevels {
    fn level(&self, role: &str) -> Option<i32> {
        self.levels.get(role).copied()
    }
}

impl<S: Into<String>> FromIterator<(S, i32)> for CharacterLevels {
    fn from_iter<I: IntoIterator<Item = (S, i32)>>(iter: I) -> Self {
        Self {
            levels: iter.into_iter().map(|(role, level)| (role.into(), level)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_adjust_and_lookup() {
        let mut levels = CharacterLevels::new();
        assert_eq!(levels.level("Mio"), None);
        levels.set("Mio", 3);
        assert_eq!(levels.level("Mio"), Some(3));
        assert_eq!(levels.adjust("Mio", 2), 5);
        assert_eq!(levels.adjust("Ren", -1), -1);
        assert_eq!(levels.len(), 2);
    }

    #[test]
    fn parse_ron_map() {
        let levels = CharacterLevels::parse_ron(r#"{"Mio": 3, "Ren": 1}"#).unwrap();
        assert_eq!(levels.level("Mio"), Some(3));
        assert_eq!(levels.level("Ren"), Some(1));
    }

    #[test]
    fn hash_map_is_a_lookup() {
        let map: HashMap<String, i32> = [("Mio".to_string(), 4)].into_iter().collect();
        assert_eq!(map.level("Mio"), Some(4));
        let by_ref = &map;
        assert_eq!(ProgressionLookup::level(&by_ref, "Mio"), Some(4));
    }

    #[test]
    fn collect_from_pairs() {
        let levels: CharacterLevels = [("Mio", 2), ("Ren", 5)].into_iter().collect();
        assert_eq!(levels.level("Ren"), Some(5));
    }
}
