use crate::modules::error::EngineError;
use crate::modules::protocol::{CatalogEntry, Category};
use crate::modules::text::fnv1a;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Seeded uniform choice over candidate subsets.
///
/// One base seed per query. Each category draws from its own stream derived
/// from `(base seed, normalized query, category)`, so adding or removing a
/// block never shifts the picks of the others.
#[derive(Debug, Clone)]
pub struct Selector {
    base_seed: u64,
    query: String,
}

impl Selector {
    /// With no explicit seed the base seed mixes the query hash with fresh
    /// entropy, so repeated queries vary.
    pub fn new(normalized_query: &str, seed: Option<u64>) -> Self {
        let base_seed = seed.unwrap_or_else(|| {
            fnv1a(&[normalized_query.as_bytes()]) ^ rand::thread_rng().gen::<u64>()
        });
        Self {
            base_seed,
            query: normalized_query.to_string(),
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn seed_for(&self, category: Category, stream: &str) -> u64 {
        fnv1a(&[
            &self.base_seed.to_le_bytes(),
            self.query.as_bytes(),
            category.as_str().as_bytes(),
            stream.as_bytes(),
        ])
    }

    pub fn rng_for(&self, category: Category, stream: &str) -> StdRng {
        StdRng::seed_from_u64(self.seed_for(category, stream))
    }

    pub fn select<'a>(
        &self,
        category: Category,
        candidates: &[&'a CatalogEntry],
    ) -> Result<&'a CatalogEntry, EngineError> {
        select(category, candidates, self.seed_for(category, "select"))
    }
}

/// Uniform pick from `candidates`. An empty subset means resolution broke
/// its own guarantee.
pub fn select<'a>(
    category: Category,
    candidates: &[&'a CatalogEntry],
    seed: u64,
) -> Result<&'a CatalogEntry, EngineError> {
    let mut rng = StdRng::seed_from_u64(seed);
    candidates
        .choose(&mut rng)
        .copied()
        .ok_or(EngineError::EmptyCandidates { category })
}
