use crate::modules::error::TablesError;
use crate::modules::protocol::{Category, EntityKind};
use crate::modules::text::normalize;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const BUILTIN_TABLES: &str = include_str!("../../data/tables.json");

pub type ImpliedGear = BTreeMap<Category, BTreeSet<String>>;

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistEntry {
    pub key: String,
    pub aliases: Vec<String>,
    #[serde(default)]
    pub implies: ImpliedGear,
    /// Categories this artist's sound must not contain.
    #[serde(default)]
    pub omit: BTreeSet<Category>,
    #[serde(default)]
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GearEntry {
    pub key: String,
    pub aliases: Vec<String>,
    #[serde(default)]
    pub implies: ImpliedGear,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreEntry {
    pub key: String,
    pub aliases: Vec<String>,
    /// Tags matched against `CatalogEntry::genre_affinity`. Empty means the key itself.
    #[serde(default)]
    pub affinity: BTreeSet<String>,
    /// Optional categories this style switches on.
    #[serde(default)]
    pub blocks: BTreeSet<Category>,
    #[serde(default)]
    pub clean: bool,
}

/// Static artist / gear / genre keyword tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupTables {
    #[serde(default)]
    pub artists: Vec<ArtistEntry>,
    #[serde(default)]
    pub gear: Vec<GearEntry>,
    #[serde(default)]
    pub genres: Vec<GenreEntry>,
}

impl LookupTables {
    pub fn builtin() -> Result<Self, TablesError> {
        Self::from_json(BUILTIN_TABLES)
    }

    pub fn from_json(text: &str) -> Result<Self, TablesError> {
        let raw: LookupTables = serde_json::from_str(text)?;
        raw.normalized()
    }

    /// Normalize keys, aliases and tags, then validate.
    pub fn normalized(mut self) -> Result<Self, TablesError> {
        for a in &mut self.artists {
            a.key = normalize(&a.key);
            a.aliases = normalize_aliases(&a.aliases);
            a.implies = normalize_implied(&a.implies);
            a.genre = a.genre.as_deref().map(normalize).filter(|g| !g.is_empty());
        }
        for g in &mut self.gear {
            g.key = normalize(&g.key);
            g.aliases = normalize_aliases(&g.aliases);
            g.implies = normalize_implied(&g.implies);
        }
        for g in &mut self.genres {
            g.key = normalize(&g.key);
            g.aliases = normalize_aliases(&g.aliases);
            g.affinity = g.affinity.iter().map(|t| normalize(t)).filter(|t| !t.is_empty()).collect();
            if g.affinity.is_empty() {
                g.affinity.insert(g.key.clone());
            }
        }

        check_keys(EntityKind::Artist, self.artists.iter().map(|a| (&a.key, &a.aliases)))?;
        check_keys(EntityKind::Gear, self.gear.iter().map(|g| (&g.key, &g.aliases)))?;
        check_keys(EntityKind::Genre, self.genres.iter().map(|g| (&g.key, &g.aliases)))?;

        for a in &self.artists {
            if let Some(genre) = &a.genre {
                if self.genre(genre).is_none() {
                    return Err(TablesError::UnknownGenre {
                        artist: a.key.clone(),
                        genre: genre.clone(),
                    });
                }
            }
        }
        Ok(self)
    }

    pub fn artist(&self, key: &str) -> Option<&ArtistEntry> {
        self.artists.iter().find(|a| a.key == key)
    }

    pub fn genre(&self, key: &str) -> Option<&GenreEntry> {
        self.genres.iter().find(|g| g.key == key)
    }
}

fn normalize_aliases(aliases: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    aliases
        .iter()
        .map(|a| normalize(a))
        .filter(|a| !a.is_empty() && seen.insert(a.clone()))
        .collect()
}

fn normalize_implied(implied: &ImpliedGear) -> ImpliedGear {
    implied
        .iter()
        .map(|(cat, tags)| {
            let tags = tags.iter().map(|t| normalize(t)).filter(|t| !t.is_empty()).collect();
            (*cat, tags)
        })
        .collect()
}

fn check_keys<'a>(
    kind: EntityKind,
    entries: impl Iterator<Item = (&'a String, &'a Vec<String>)>,
) -> Result<(), TablesError> {
    let mut keys = HashSet::new();
    for (key, aliases) in entries {
        if key.is_empty() {
            return Err(TablesError::EmptyKey { kind });
        }
        if aliases.is_empty() {
            return Err(TablesError::NoAliases {
                kind,
                key: key.clone(),
            });
        }
        if !keys.insert(key.as_str()) {
            return Err(TablesError::DuplicateKey {
                kind,
                key: key.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_load_and_normalize() {
        let tables = LookupTables::builtin().unwrap();
        let bb = tables.artist("bb king").unwrap();
        assert!(bb.omit.contains(&Category::Drive));
        assert_eq!(bb.genre.as_deref(), Some("blues"));
        let slash = tables.artist("slash").unwrap();
        assert!(slash.aliases.contains(&"guns n roses".to_string()));
        assert!(tables.genre("metal").unwrap().blocks.contains(&Category::Drive));
    }

    #[test]
    fn empty_affinity_defaults_to_key() {
        let tables = LookupTables::from_json(
            r#"{ "genres": [ { "key": "Surf", "aliases": ["surf", "SURF!"] } ] }"#,
        )
        .unwrap();
        let surf = tables.genre("surf").unwrap();
        assert_eq!(surf.aliases, vec!["surf".to_string()]);
        assert!(surf.affinity.contains("surf"));
    }

    #[test]
    fn rejects_unknown_artist_genre() {
        let err = LookupTables::from_json(
            r#"{ "artists": [ { "key": "x", "aliases": ["x"], "genre": "polka" } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, TablesError::UnknownGenre { .. }));
    }

    #[test]
    fn rejects_entry_without_aliases() {
        let err = LookupTables::from_json(r#"{ "gear": [ { "key": "vox", "aliases": ["!!"] } ] }"#)
            .unwrap_err();
        assert!(matches!(err, TablesError::NoAliases { kind: EntityKind::Gear, .. }));
    }
}
