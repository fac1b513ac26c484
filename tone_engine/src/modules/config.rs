use crate::modules::protocol::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum normalized Levenshtein similarity for a fuzzy gear alias hit.
    pub gear_fuzzy_threshold: f64,
    /// Same, for artist and genre aliases.
    pub name_fuzzy_threshold: f64,
    /// Aliases shorter than this (in chars) only match exactly.
    pub min_fuzzy_len: usize,
    /// Half-width of the perturbation around a parameter default, as a
    /// fraction of the parameter's range.
    pub variation: f64,
    /// Categories planned for every query.
    pub base_categories: BTreeSet<Category>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gear_fuzzy_threshold: 0.8,
            name_fuzzy_threshold: 0.85,
            min_fuzzy_len: 4,
            variation: 0.12,
            base_categories: [
                Category::Input,
                Category::Amp,
                Category::Cab,
                Category::Reverb,
                Category::Output,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `TONE_*` overrides from `lookup`. Values that don't parse or fall
    /// outside their sane range are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = threshold(&lookup, "TONE_GEAR_FUZZY_THRESHOLD") {
            self.gear_fuzzy_threshold = v;
        }
        if let Some(v) = threshold(&lookup, "TONE_NAME_FUZZY_THRESHOLD") {
            self.name_fuzzy_threshold = v;
        }
        if let Some(raw) = lookup("TONE_MIN_FUZZY_LEN") {
            match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => self.min_fuzzy_len = v,
                _ => tracing::warn!(value = %raw, "ignoring TONE_MIN_FUZZY_LEN (expected a positive integer)"),
            }
        }
        if let Some(raw) = lookup("TONE_VARIATION") {
            match raw.trim().parse::<f64>() {
                Ok(v) if (0.0..=0.5).contains(&v) => self.variation = v,
                _ => tracing::warn!(value = %raw, "ignoring TONE_VARIATION (expected 0..=0.5)"),
            }
        }
        if let Some(raw) = lookup("TONE_BASE_CATEGORIES") {
            let parsed: Option<BTreeSet<Category>> =
                raw.split(',').map(Category::parse).collect();
            match parsed {
                Some(set) if !set.is_empty() => self.base_categories = set,
                _ => tracing::warn!(value = %raw, "ignoring TONE_BASE_CATEGORIES"),
            }
        }
        self
    }
}

fn threshold(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v > 0.0 && v <= 1.0 => Some(v),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring threshold override (expected 0 < t <= 1)");
            None
        }
    }
}
