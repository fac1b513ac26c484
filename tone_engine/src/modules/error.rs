use crate::modules::protocol::{Category, EntityKind};
use thiserror::Error;

/// Catalog problems found while loading. The engine assumes none of these
/// survive past [`Catalog::from_json`](crate::modules::catalog::Catalog::from_json).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{category} entry has an empty display name")]
    EmptyName { category: Category },
    #[error("duplicate display name '{model}' in category {category}")]
    DuplicateName { category: Category, model: String },
    #[error("entry '{model}' ({category}) references unknown schema '{schema}'")]
    UnknownSchema {
        category: Category,
        model: String,
        schema: String,
    },
    #[error("entry '{model}' ({category}) has no parameter schema")]
    MissingSchema { category: Category, model: String },
    #[error("entry '{model}' ({category}) declares param '{param}' twice")]
    DuplicateParam {
        category: Category,
        model: String,
        param: String,
    },
    #[error(
        "entry '{model}' ({category}) param '{param}' has invalid range: min={min} default={default} max={max}"
    )]
    InvalidRange {
        category: Category,
        model: String,
        param: String,
        min: f64,
        default: f64,
        max: f64,
    },
    #[error("catalog has no {category} entries")]
    EmptyCategory { category: Category },
}

#[derive(Debug, Error)]
pub enum TablesError {
    #[error("lookup tables parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{kind:?} entry has an empty key")]
    EmptyKey { kind: EntityKind },
    #[error("{kind:?} entry '{key}' has no usable aliases")]
    NoAliases { kind: EntityKind, key: String },
    #[error("duplicate {kind:?} key '{key}'")]
    DuplicateKey { kind: EntityKind, key: String },
    #[error("artist '{artist}' refers to unknown genre '{genre}'")]
    UnknownGenre { artist: String, genre: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Tables(#[from] TablesError),
}

/// Internal invariant violations. Unusual user input never produces one of
/// these; each variant means the engine itself is wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no candidates left for required category {category}")]
    EmptyCandidates { category: Category },
    #[error("selector picked '{model}' outside the {category} candidate subset")]
    SelectionOutsideSubset { category: Category, model: String },
    #[error(
        "value {value} for '{model}'.{param} ({category}) is outside [{min}, {max}]"
    )]
    ValueOutOfRange {
        category: Category,
        model: String,
        param: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("'{model}' ({category}) has no parameter named '{param}'")]
    UnknownParam {
        category: Category,
        model: String,
        param: String,
    },
    #[error("category {category} assembled more than once")]
    DuplicateCategory { category: Category },
    #[error("required category {category} missing from assembled tone")]
    MissingCategory { category: Category },
    #[error("category {category} was omitted but still assembled")]
    UnexpectedCategory { category: Category },
}

impl EngineError {
    pub fn category(&self) -> Category {
        match self {
            EngineError::EmptyCandidates { category }
            | EngineError::SelectionOutsideSubset { category, .. }
            | EngineError::ValueOutOfRange { category, .. }
            | EngineError::UnknownParam { category, .. }
            | EngineError::DuplicateCategory { category }
            | EngineError::MissingCategory { category }
            | EngineError::UnexpectedCategory { category } => *category,
        }
    }
}
