use crate::modules::catalog::{Catalog, CORE_CATEGORIES};
use crate::modules::config::EngineConfig;
use crate::modules::protocol::{CatalogEntry, Category, EntityKind, RecognizedEntity, ResolutionSource};
use crate::modules::synthesizer::SynthesisContext;
use crate::modules::tables::LookupTables;
use std::collections::{BTreeMap, BTreeSet};

/// What a strategy has to say about one category.
#[derive(Debug, Clone, PartialEq)]
pub enum Opinion {
    Tags(BTreeSet<String>),
    NoOpinion,
}

/// One precedence level of the resolution cascade.
pub trait ResolverStrategy: Send + Sync {
    fn source(&self) -> ResolutionSource;

    fn opinion(
        &self,
        category: Category,
        entities: &[RecognizedEntity],
        tables: &LookupTables,
    ) -> Opinion;

    fn admits(&self, entry: &CatalogEntry, tags: &BTreeSet<String>) -> bool;
}

/// Brand tags implied by every entity of one kind, unioned.
struct ImpliedBrandStrategy {
    kind: EntityKind,
    source: ResolutionSource,
}

impl ResolverStrategy for ImpliedBrandStrategy {
    fn source(&self) -> ResolutionSource {
        self.source
    }

    fn opinion(&self, category: Category, entities: &[RecognizedEntity], _: &LookupTables) -> Opinion {
        let tags: BTreeSet<String> = entities
            .iter()
            .filter(|e| e.kind == self.kind)
            .filter_map(|e| e.implied_gear.get(&category))
            .flatten()
            .cloned()
            .collect();
        if tags.is_empty() {
            Opinion::NoOpinion
        } else {
            Opinion::Tags(tags)
        }
    }

    fn admits(&self, entry: &CatalogEntry, tags: &BTreeSet<String>) -> bool {
        entry.has_any_brand(tags)
    }
}

/// Affinity tags of every recognized genre, unioned.
struct GenreAffinityStrategy;

impl ResolverStrategy for GenreAffinityStrategy {
    fn source(&self) -> ResolutionSource {
        ResolutionSource::Genre
    }

    fn opinion(&self, _: Category, entities: &[RecognizedEntity], tables: &LookupTables) -> Opinion {
        let tags: BTreeSet<String> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Genre)
            .filter_map(|e| tables.genre(&e.canonical_key))
            .flat_map(|g| g.affinity.iter().cloned())
            .collect();
        if tags.is_empty() {
            Opinion::NoOpinion
        } else {
            Opinion::Tags(tags)
        }
    }

    fn admits(&self, entry: &CatalogEntry, tags: &BTreeSet<String>) -> bool {
        entry.has_any_genre(tags)
    }
}

/// Gear, then artist, then genre.
pub fn default_strategies() -> Vec<Box<dyn ResolverStrategy>> {
    vec![
        Box::new(ImpliedBrandStrategy {
            kind: EntityKind::Gear,
            source: ResolutionSource::Gear,
        }),
        Box::new(ImpliedBrandStrategy {
            kind: EntityKind::Artist,
            source: ResolutionSource::Artist,
        }),
        Box::new(GenreAffinityStrategy),
    ]
}

#[derive(Debug, Clone)]
pub struct CandidateSet<'a> {
    pub source: ResolutionSource,
    /// Tags the winning level filtered on. Empty when unrestricted.
    pub tags: BTreeSet<String>,
    pub entries: Vec<&'a CatalogEntry>,
    /// The winning level matched nothing in the catalog.
    pub fell_back: bool,
}

impl CandidateSet<'_> {
    pub fn contains(&self, entry: &CatalogEntry) -> bool {
        self.entries.iter().any(|e| std::ptr::eq(*e, entry))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OmitReason {
    /// An artist's sound excludes the category.
    Artist(String),
    /// A clean style with no explicit gear asking for the category.
    CleanStyle(String),
}

#[derive(Debug, Clone)]
pub enum CategoryPlan<'a> {
    Select(CandidateSet<'a>),
    Omit(OmitReason),
}

#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub plans: BTreeMap<Category, CategoryPlan<'a>>,
    pub context: SynthesisContext,
}

impl<'a> Resolution<'a> {
    pub fn candidates(&self, category: Category) -> Option<&CandidateSet<'a>> {
        match self.plans.get(&category)? {
            CategoryPlan::Select(c) => Some(c),
            CategoryPlan::Omit(_) => None,
        }
    }
}

/// Turns recognized entities into a per-category plan over the catalog.
pub struct GearResolver<'a> {
    catalog: &'a Catalog,
    tables: &'a LookupTables,
    config: &'a EngineConfig,
    strategies: Vec<Box<dyn ResolverStrategy>>,
}

impl<'a> GearResolver<'a> {
    pub fn new(catalog: &'a Catalog, tables: &'a LookupTables, config: &'a EngineConfig) -> Self {
        Self::with_strategies(catalog, tables, config, default_strategies())
    }

    pub fn with_strategies(
        catalog: &'a Catalog,
        tables: &'a LookupTables,
        config: &'a EngineConfig,
        strategies: Vec<Box<dyn ResolverStrategy>>,
    ) -> Self {
        Self {
            catalog,
            tables,
            config,
            strategies,
        }
    }

    pub fn resolve(&self, entities: &[RecognizedEntity]) -> Resolution<'a> {
        let context = self.context(entities);
        let omissions = self.omissions(entities);

        let mut plans = BTreeMap::new();
        for category in self.planned(entities) {
            let plan = match omissions.get(&category) {
                Some(reason) => {
                    tracing::debug!(%category, ?reason, "category omitted");
                    CategoryPlan::Omit(reason.clone())
                }
                None => CategoryPlan::Select(self.candidates(category, entities)),
            };
            plans.insert(category, plan);
        }
        Resolution { plans, context }
    }

    fn planned(&self, entities: &[RecognizedEntity]) -> BTreeSet<Category> {
        let mut planned: BTreeSet<Category> = self.config.base_categories.clone();
        planned.extend(CORE_CATEGORIES);
        for e in entities {
            planned.extend(e.implied_gear.keys().copied());
        }
        for genre in self.genres_in_play(entities) {
            if let Some(g) = self.tables.genre(genre) {
                planned.extend(g.blocks.iter().copied());
            }
        }
        planned.retain(|c| self.catalog.has_category(*c));
        planned
    }

    /// Recognized genre keys first, then genres of recognized artists.
    fn genres_in_play<'e>(&'e self, entities: &'e [RecognizedEntity]) -> Vec<&'e str> {
        let mut out: Vec<&str> = Vec::new();
        let direct = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Genre)
            .map(|e| e.canonical_key.as_str());
        let via_artist = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Artist)
            .filter_map(|e| self.tables.artist(&e.canonical_key))
            .filter_map(|a| a.genre.as_deref());
        for g in direct.chain(via_artist) {
            if !out.contains(&g) {
                out.push(g);
            }
        }
        out
    }

    fn omissions(&self, entities: &[RecognizedEntity]) -> BTreeMap<Category, OmitReason> {
        let mut out = BTreeMap::new();

        for e in entities.iter().filter(|e| e.kind == EntityKind::Genre) {
            let Some(genre) = self.tables.genre(&e.canonical_key) else {
                continue;
            };
            if genre.clean && !gear_implies(entities, Category::Drive) {
                out.entry(Category::Drive)
                    .or_insert_with(|| OmitReason::CleanStyle(genre.key.clone()));
            }
        }

        // Artist omissions are hard and replace any softer reason.
        for e in entities.iter().filter(|e| e.kind == EntityKind::Artist) {
            let Some(artist) = self.tables.artist(&e.canonical_key) else {
                continue;
            };
            for category in &artist.omit {
                if CORE_CATEGORIES.contains(category) {
                    tracing::warn!(artist = %artist.key, %category, "ignoring omission of a core category");
                    continue;
                }
                out.insert(*category, OmitReason::Artist(artist.key.clone()));
            }
        }
        out
    }

    fn context(&self, entities: &[RecognizedEntity]) -> SynthesisContext {
        let genres = self.genres_in_play(entities);
        let dominant = genres.first().map(|g| g.to_string());

        let mut styles: Vec<String> = Vec::new();
        for key in &genres {
            styles.push(key.to_string());
            if let Some(g) = self.tables.genre(key) {
                for tag in &g.affinity {
                    if !styles.contains(tag) {
                        styles.push(tag.clone());
                    }
                }
            }
        }

        let mut force_min_intensity = BTreeSet::new();
        let clean_style = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Genre)
            .filter_map(|e| self.tables.genre(&e.canonical_key))
            .any(|g| g.clean);
        if clean_style && gear_implies(entities, Category::Drive) {
            force_min_intensity.insert(Category::Drive);
        }

        SynthesisContext {
            genre: dominant,
            styles,
            force_min_intensity,
        }
    }

    fn candidates(&self, category: Category, entities: &[RecognizedEntity]) -> CandidateSet<'a> {
        let all = self.catalog.entries(category);

        for strategy in &self.strategies {
            let Opinion::Tags(tags) = strategy.opinion(category, entities, self.tables) else {
                continue;
            };
            let source = strategy.source();
            let subset: Vec<&CatalogEntry> =
                all.iter().copied().filter(|e| strategy.admits(e, &tags)).collect();

            if subset.is_empty() {
                if source == ResolutionSource::Genre {
                    tracing::debug!(%category, ?tags, "no genre match; using unrestricted set");
                } else {
                    tracing::warn!(%category, ?source, ?tags, "tags matched zero catalog entries; using unrestricted set");
                }
                return CandidateSet {
                    source: ResolutionSource::Unrestricted,
                    tags,
                    entries: all,
                    fell_back: true,
                };
            }

            tracing::debug!(%category, ?source, candidates = subset.len(), "resolved");
            return CandidateSet {
                source,
                tags,
                entries: subset,
                fell_back: false,
            };
        }

        CandidateSet {
            source: ResolutionSource::Unrestricted,
            tags: BTreeSet::new(),
            entries: all,
            fell_back: false,
        }
    }
}

fn gear_implies(entities: &[RecognizedEntity], category: Category) -> bool {
    entities
        .iter()
        .any(|e| e.kind == EntityKind::Gear && e.implied_gear.contains_key(&category))
}
