use crate::modules::assembler::{assemble, Assembly, Selection};
use crate::modules::catalog::Catalog;
use crate::modules::config::EngineConfig;
use crate::modules::error::{EngineError, LoadError};
use crate::modules::protocol::ToneSpec;
use crate::modules::recognizer::{characteristics, EntityRecognizer};
use crate::modules::resolver::{CategoryPlan, GearResolver};
use crate::modules::selector::Selector;
use crate::modules::synthesizer::ParameterSynthesizer;
use crate::modules::tables::LookupTables;
use crate::modules::text::normalize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Query in, tone out. Holds only immutable shared data, so one engine can
/// serve any number of threads.
#[derive(Debug, Clone)]
pub struct ToneEngine {
    catalog: Arc<Catalog>,
    tables: Arc<LookupTables>,
    config: EngineConfig,
}

impl ToneEngine {
    pub fn new(catalog: Arc<Catalog>, tables: Arc<LookupTables>, config: EngineConfig) -> Self {
        Self {
            catalog,
            tables,
            config,
        }
    }

    /// Built-in catalog and tables, config from `TONE_*` env vars.
    pub fn builtin() -> Result<Self, LoadError> {
        Ok(Self::new(
            Arc::new(Catalog::builtin()?),
            Arc::new(LookupTables::builtin()?),
            EngineConfig::from_env(),
        ))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Total over free text: any query yields a tone. An error means the
    /// engine broke one of its own invariants.
    pub fn generate_tone(&self, query: &str, seed: Option<u64>) -> Result<ToneSpec, EngineError> {
        let normalized = normalize(query);
        let entities = EntityRecognizer::new(&self.tables, &self.config).recognize(query);
        let resolution =
            GearResolver::new(&self.catalog, &self.tables, &self.config).resolve(&entities);

        let selector = Selector::new(&normalized, seed);
        let synthesizer = ParameterSynthesizer::new(self.config.variation);
        tracing::debug!(
            query = %normalized,
            seed = selector.base_seed(),
            entities = entities.len(),
            "generating tone"
        );

        let mut required = BTreeSet::new();
        let mut omitted = BTreeSet::new();
        let mut selections = Vec::new();
        for (&category, plan) in &resolution.plans {
            let candidates = match plan {
                CategoryPlan::Omit(_) => {
                    omitted.insert(category);
                    continue;
                }
                CategoryPlan::Select(c) => c,
            };
            required.insert(category);

            let entry = selector.select(category, &candidates.entries)?;
            if !candidates.contains(entry) {
                return Err(EngineError::SelectionOutsideSubset {
                    category,
                    model: entry.display_name.clone(),
                });
            }

            let mut rng = selector.rng_for(category, "params");
            let parameters = synthesizer.synthesize(entry, &resolution.context, &mut rng)?;
            tracing::debug!(%category, model = %entry.display_name, source = ?candidates.source, "selected");
            selections.push(Selection {
                entry,
                source: candidates.source,
                parameters,
            });
        }

        assemble(Assembly {
            query: query.to_string(),
            seed: selector.base_seed(),
            genre: resolution.context.genre.clone(),
            entities,
            characteristics: characteristics(query),
            required,
            omitted,
            selections,
        })
    }
}
