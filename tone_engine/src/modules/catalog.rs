use crate::modules::error::CatalogError;
use crate::modules::protocol::{CatalogEntry, Category, ParamSpec};
use crate::modules::text::normalize;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

/// Categories every catalog must populate.
pub const CORE_CATEGORIES: [Category; 2] = [Category::Amp, Category::Cab];

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    schemas: BTreeMap<String, Vec<ParamSpec>>,
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    category: Category,
    display_name: String,
    #[serde(default)]
    real_world: Option<String>,
    #[serde(default)]
    brand_tags: Vec<String>,
    #[serde(default)]
    genre_affinity: Vec<String>,
    /// Named shared schema; defaults to the schema named after the category.
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    parameters: Option<Vec<ParamSpec>>,
}

/// Read-only reference catalog, grouped by category.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_category: BTreeMap<Category, Vec<usize>>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        let mut entries = Vec::with_capacity(file.entries.len());
        for raw in file.entries {
            let parameter_schema = match (raw.parameters, raw.schema) {
                (Some(params), _) => params,
                (None, Some(name)) => file.schemas.get(&name).cloned().ok_or_else(|| {
                    CatalogError::UnknownSchema {
                        category: raw.category,
                        model: raw.display_name.clone(),
                        schema: name.clone(),
                    }
                })?,
                (None, None) => file
                    .schemas
                    .get(raw.category.as_str())
                    .cloned()
                    .ok_or_else(|| CatalogError::MissingSchema {
                        category: raw.category,
                        model: raw.display_name.clone(),
                    })?,
            };
            entries.push(CatalogEntry {
                category: raw.category,
                display_name: raw.display_name.trim().to_string(),
                real_world: raw.real_world,
                brand_tags: normalize_tags(&raw.brand_tags),
                genre_affinity: normalize_tags(&raw.genre_affinity),
                parameter_schema,
            });
        }
        Self::from_entries(entries)
    }

    /// Validate and index already-built entries.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut by_category: BTreeMap<Category, Vec<usize>> = BTreeMap::new();
        let mut names: HashSet<(Category, String)> = HashSet::new();

        for (idx, entry) in entries.iter().enumerate() {
            validate_entry(entry)?;
            if !names.insert((entry.category, entry.display_name.to_lowercase())) {
                return Err(CatalogError::DuplicateName {
                    category: entry.category,
                    model: entry.display_name.clone(),
                });
            }
            by_category.entry(entry.category).or_default().push(idx);
        }

        for category in CORE_CATEGORIES {
            if !by_category.contains_key(&category) {
                return Err(CatalogError::EmptyCategory { category });
            }
        }

        tracing::debug!(
            entries = entries.len(),
            categories = by_category.len(),
            "catalog loaded"
        );
        Ok(Self {
            entries,
            by_category,
        })
    }

    pub fn entries(&self, category: Category) -> Vec<&CatalogEntry> {
        self.by_category
            .get(&category)
            .map(|idxs| idxs.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.by_category.contains_key(&category)
    }

    pub fn find(&self, category: Category, display_name: &str) -> Option<&CatalogEntry> {
        self.entries(category)
            .into_iter()
            .find(|e| e.display_name.eq_ignore_ascii_case(display_name.trim()))
    }

    /// Number of models across all categories.
    pub fn model_count(&self) -> usize {
        self.entries.len()
    }
}

fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| normalize(t))
        .filter(|t| !t.is_empty())
        .collect()
}

fn validate_entry(entry: &CatalogEntry) -> Result<(), CatalogError> {
    if entry.display_name.trim().is_empty() {
        return Err(CatalogError::EmptyName {
            category: entry.category,
        });
    }
    let mut seen = HashSet::new();
    for p in &entry.parameter_schema {
        if !seen.insert(p.name.as_str()) {
            return Err(CatalogError::DuplicateParam {
                category: entry.category,
                model: entry.display_name.clone(),
                param: p.name.clone(),
            });
        }
        if !p.is_well_formed() {
            return Err(CatalogError::InvalidRange {
                category: entry.category,
                model: entry.display_name.clone(),
                param: p.name.clone(),
                min: p.min,
                default: p.default,
                max: p.max,
            });
        }
    }
    Ok(())
}
