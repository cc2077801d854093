//! Deck configuration (`spec.md` §3, §4.5) plus the XDG/env-var plumbing
//! used to locate the database and media directory (`spec.md` §6).

use crate::model::LeechAction;
use crate::{Error, LibraryError};
use etcetera::{AppStrategy, AppStrategyArgs, choose_app_strategy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub fn get_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        let mut dir = PathBuf::from(home);
        dir.push(".mcp-anki");
        return dir;
    }
    let strategy: etcetera::app_strategy::Xdg = choose_app_strategy(AppStrategyArgs {
        top_level_domain: "org".to_string(),
        author: "mcp-anki".to_string(),
        app_name: "mcp-anki".to_string(),
    })
    .expect("HOME or a platform config dir must be resolvable");
    strategy.data_dir()
}

pub fn default_db_path() -> PathBuf {
    std::env::var("MCP_ANKI_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = get_data_dir();
            path.push("anki.db");
            path
        })
}

pub fn default_media_dir() -> PathBuf {
    std::env::var("MCP_ANKI_MEDIA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = get_data_dir();
            path.push("media");
            path
        })
}

/// Embedded in `decks.config_json`; merged three-way (defaults ⊕ stored ⊕
/// patch) on every write.
#[derive(Clone, Debug, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(default)]
pub struct DeckConfig {
    pub learning_steps_mins: Vec<u32>,
    pub graduating_interval_days: i64,
    pub easy_bonus: f64,
    pub hard_interval: f64,
    pub lapse_steps_mins: Vec<u32>,
    pub new_per_day: u32,
    pub reviews_per_day: u32,
    pub min_ease: f64,
    pub leech_threshold: u32,
    pub leech_action: LeechAction,
    pub fuzz_percent: f64,
    pub bury_siblings: bool,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            learning_steps_mins: vec![1, 10],
            graduating_interval_days: 1,
            easy_bonus: 1.3,
            hard_interval: 1.2,
            lapse_steps_mins: vec![10],
            new_per_day: 20,
            reviews_per_day: 200,
            min_ease: 1.3,
            leech_threshold: 8,
            leech_action: LeechAction::Suspend,
            fuzz_percent: 0.05,
            bury_siblings: true,
        }
    }
}

/// Sparse JSON patch: every field optional, only present fields overwrite.
#[derive(Clone, Debug, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub struct DeckConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_steps_mins: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduating_interval_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easy_bonus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_interval: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lapse_steps_mins: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_per_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews_per_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ease: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leech_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leech_action: Option<LeechAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzz_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bury_siblings: Option<bool>,
}

impl DeckConfig {
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("DeckConfig always serialises")
    }

    /// `defaults ⊕ stored ⊕ patch`, then validated.
    pub fn merge(stored: &DeckConfig, patch: &DeckConfigPatch) -> Result<DeckConfig, Error> {
        let mut merged = stored.clone();
        if let Some(v) = patch.learning_steps_mins.clone() {
            merged.learning_steps_mins = v;
        }
        if let Some(v) = patch.graduating_interval_days {
            merged.graduating_interval_days = v;
        }
        if let Some(v) = patch.easy_bonus {
            merged.easy_bonus = v;
        }
        if let Some(v) = patch.hard_interval {
            merged.hard_interval = v;
        }
        if let Some(v) = patch.lapse_steps_mins.clone() {
            merged.lapse_steps_mins = v;
        }
        if let Some(v) = patch.new_per_day {
            merged.new_per_day = v;
        }
        if let Some(v) = patch.reviews_per_day {
            merged.reviews_per_day = v;
        }
        if let Some(v) = patch.min_ease {
            merged.min_ease = v;
        }
        if let Some(v) = patch.leech_threshold {
            merged.leech_threshold = v;
        }
        if let Some(v) = patch.leech_action {
            merged.leech_action = v;
        }
        if let Some(v) = patch.fuzz_percent {
            merged.fuzz_percent = v;
        }
        if let Some(v) = patch.bury_siblings {
            merged.bury_siblings = v;
        }
        merged.validate()?;
        Ok(merged)
    }

    fn validate(&self) -> Result<(), Error> {
        let mut failures = Vec::new();
        if self.learning_steps_mins.is_empty() {
            failures.push("learning_steps_mins must be non-empty".to_string());
        }
        if self.lapse_steps_mins.is_empty() {
            failures.push("lapse_steps_mins must be non-empty".to_string());
        }
        if self.graduating_interval_days <= 0 {
            failures.push("graduating_interval_days must be > 0".to_string());
        }
        if self.easy_bonus < 1.0 {
            failures.push("easy_bonus must be >= 1.0".to_string());
        }
        if self.hard_interval < 1.0 {
            failures.push("hard_interval must be >= 1.0".to_string());
        }
        if self.min_ease < 1.3 {
            failures.push("min_ease must be >= 1.3".to_string());
        }
        if self.leech_threshold < 1 {
            failures.push("leech_threshold must be >= 1".to_string());
        }
        if !(0.0..=0.5).contains(&self.fuzz_percent) {
            failures.push("fuzz_percent must be within [0, 0.5]".to_string());
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Library(LibraryError::ValidationError {
                description: "deck configuration failed validation".to_string(),
                fields: failures,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_applies_only_patched_fields() {
        let stored = DeckConfig::default();
        let patch = DeckConfigPatch {
            new_per_day: Some(5),
            ..Default::default()
        };
        let merged = DeckConfig::merge(&stored, &patch).unwrap();
        assert_eq!(merged.new_per_day, 5);
        assert_eq!(merged.reviews_per_day, stored.reviews_per_day);
    }

    #[test]
    fn merge_rejects_empty_learning_steps() {
        let stored = DeckConfig::default();
        let patch = DeckConfigPatch {
            learning_steps_mins: Some(vec![]),
            ..Default::default()
        };
        let err = DeckConfig::merge(&stored, &patch).unwrap_err();
        assert!(matches!(
            err,
            Error::Library(LibraryError::ValidationError { .. })
        ));
    }

    #[test]
    fn merge_lists_every_failed_field() {
        let stored = DeckConfig::default();
        let patch = DeckConfigPatch {
            learning_steps_mins: Some(vec![]),
            lapse_steps_mins: Some(vec![]),
            min_ease: Some(1.0),
            ..Default::default()
        };
        let Err(Error::Library(LibraryError::ValidationError { fields, .. })) =
            DeckConfig::merge(&stored, &patch)
        else {
            panic!("expected a validation error");
        };
        assert_eq!(fields.len(), 3);
    }
}
