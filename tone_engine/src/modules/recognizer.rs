use crate::modules::config::EngineConfig;
use crate::modules::protocol::{EntityKind, RecognizedEntity};
use crate::modules::tables::{ImpliedGear, LookupTables};
use crate::modules::text::{normalize, tokens};
use std::collections::HashSet;

/// Slack for float comparisons against the fuzzy threshold.
const SIMILARITY_EPSILON: f64 = 1e-9;

const CHARACTERISTICS: &[(&str, &[&str])] = &[
    ("lead", &["lead"]),
    ("rhythm", &["rhythm"]),
    ("clean", &["clean"]),
    ("distorted", &["distorted", "dirty"]),
    ("bright", &["bright"]),
    ("warm", &["warm"]),
];

struct AliasPattern<'t> {
    kind: EntityKind,
    key: &'t str,
    alias: &'t str,
    tokens: Vec<&'t str>,
    chars: usize,
    threshold: f64,
    implied: Option<&'t ImpliedGear>,
}

struct Hit<'t> {
    position: usize,
    matched: String,
    fuzzy: bool,
    pattern: &'t AliasPattern<'t>,
}

/// Finds artist, gear and genre mentions in free text.
pub struct EntityRecognizer<'t> {
    patterns: Vec<AliasPattern<'t>>,
    min_fuzzy_len: usize,
}

impl<'t> EntityRecognizer<'t> {
    pub fn new(tables: &'t LookupTables, config: &EngineConfig) -> Self {
        let gear = config.gear_fuzzy_threshold;
        let names = config.name_fuzzy_threshold;
        let mut patterns = Vec::new();
        // Table order doubles as the tie-break when two kinds share an alias.
        for g in &tables.gear {
            for alias in &g.aliases {
                patterns.push(pattern(EntityKind::Gear, &g.key, alias, gear, Some(&g.implies)));
            }
        }
        for a in &tables.artists {
            for alias in &a.aliases {
                patterns.push(pattern(EntityKind::Artist, &a.key, alias, names, Some(&a.implies)));
            }
        }
        for g in &tables.genres {
            for alias in &g.aliases {
                patterns.push(pattern(EntityKind::Genre, &g.key, alias, names, None));
            }
        }
        // Longest alias first so "heavy metal" beats "heavy" and "fuzz face" beats "fuzz".
        patterns.sort_by(|a, b| {
            b.tokens
                .len()
                .cmp(&a.tokens.len())
                .then_with(|| b.alias.len().cmp(&a.alias.len()))
        });

        Self {
            patterns,
            min_fuzzy_len: config.min_fuzzy_len,
        }
    }

    /// Entities in order of first appearance. Empty or unrecognizable text
    /// yields an empty vec.
    pub fn recognize(&self, query: &str) -> Vec<RecognizedEntity> {
        let normalized = normalize(query);
        let toks = tokens(&normalized);
        if toks.is_empty() {
            return Vec::new();
        }

        // offsets[i] = chars in toks[..i], so a window's width needs no join.
        let mut offsets = Vec::with_capacity(toks.len() + 1);
        let mut total = 0usize;
        offsets.push(total);
        for t in &toks {
            total += t.chars().count();
            offsets.push(total);
        }

        let mut consumed = vec![false; toks.len()];
        let mut hits: Vec<Hit<'_>> = Vec::new();

        // Exact matches claim tokens before any fuzzy match is attempted.
        for fuzzy in [false, true] {
            for p in &self.patterns {
                let n = p.tokens.len();
                if n == 0 || n > toks.len() {
                    continue;
                }
                if fuzzy && p.chars < self.min_fuzzy_len {
                    continue;
                }
                for start in 0..=(toks.len() - n) {
                    let width = offsets[start + n] - offsets[start] + (n - 1);
                    let reachable = if fuzzy {
                        within_reach(width, p.chars, p.threshold)
                    } else {
                        width == p.chars
                    };
                    if !reachable || consumed[start..start + n].iter().any(|c| *c) {
                        continue;
                    }
                    let window = &toks[start..start + n];
                    let matched = if fuzzy {
                        similar(&window.join(" "), p)
                    } else {
                        window == p.tokens.as_slice()
                    };
                    if !matched {
                        continue;
                    }
                    consumed[start..start + n].iter_mut().for_each(|c| *c = true);
                    hits.push(Hit {
                        position: start,
                        matched: window.join(" "),
                        fuzzy,
                        pattern: p,
                    });
                }
            }
        }

        hits.sort_by_key(|h| h.position);
        let mut seen: HashSet<(EntityKind, &str)> = HashSet::new();
        let mut out = Vec::new();
        for hit in hits {
            if !seen.insert((hit.pattern.kind, hit.pattern.key)) {
                continue;
            }
            tracing::debug!(
                kind = ?hit.pattern.kind,
                key = hit.pattern.key,
                matched = %hit.matched,
                fuzzy = hit.fuzzy,
                "recognized entity"
            );
            out.push(RecognizedEntity {
                kind: hit.pattern.kind,
                canonical_key: hit.pattern.key.to_string(),
                matched: hit.matched,
                position: hit.position,
                fuzzy: hit.fuzzy,
                implied_gear: hit.pattern.implied.cloned().unwrap_or_default(),
            });
        }
        out
    }
}

/// Playing-style words named in the query, in a fixed order and without
/// repeats. Whole tokens only.
pub fn characteristics(query: &str) -> Vec<String> {
    let normalized = normalize(query);
    let present: HashSet<&str> = tokens(&normalized).into_iter().collect();
    CHARACTERISTICS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| present.contains(w)))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Edit distance is at least the length difference, which caps the best
/// similarity two strings of these widths can reach.
fn within_reach(width: usize, alias_chars: usize, threshold: f64) -> bool {
    let longest = width.max(alias_chars);
    if longest == 0 {
        return true;
    }
    let ceiling = 1.0 - width.abs_diff(alias_chars) as f64 / longest as f64;
    ceiling + SIMILARITY_EPSILON >= threshold
}

fn similar(candidate: &str, p: &AliasPattern<'_>) -> bool {
    candidate == p.alias
        || strsim::normalized_levenshtein(candidate, p.alias) + SIMILARITY_EPSILON >= p.threshold
}

fn pattern<'t>(
    kind: EntityKind,
    key: &'t str,
    alias: &'t str,
    threshold: f64,
    implied: Option<&'t ImpliedGear>,
) -> AliasPattern<'t> {
    AliasPattern {
        kind,
        key,
        alias,
        tokens: tokens(alias),
        chars: alias.chars().count(),
        threshold,
        implied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> LookupTables {
        LookupTables::builtin().unwrap()
    }

    fn keys(entities: &[RecognizedEntity]) -> Vec<(EntityKind, &str)> {
        entities
            .iter()
            .map(|e| (e.kind, e.canonical_key.as_str()))
            .collect()
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        assert!(r.recognize("").is_empty());
        assert!(r.recognize("   \t\n").is_empty());
        assert!(r.recognize("!!! ??? ...").is_empty());
    }

    #[test]
    fn recognizes_all_kinds_in_query_order() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        let found = r.recognize("SRV-style blues with a Marshall Plexi");
        assert_eq!(
            keys(&found),
            vec![
                (EntityKind::Artist, "stevie ray vaughan"),
                (EntityKind::Genre, "blues"),
                (EntityKind::Gear, "marshall"),
                (EntityKind::Gear, "plexi"),
            ]
        );
        assert!(found.iter().all(|e| !e.fuzzy));
    }

    #[test]
    fn tolerates_common_misspellings() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        let found = r.recognize("hendrixx through a plexy");
        assert_eq!(
            keys(&found),
            vec![(EntityKind::Artist, "jimi hendrix"), (EntityKind::Gear, "plexi")]
        );
        assert!(found.iter().all(|e| e.fuzzy));
        assert_eq!(found[0].matched, "hendrixx");
    }

    #[test]
    fn everyday_words_are_not_names() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        assert!(r.recognize("great price on a crunchy amp").is_empty());
        assert_eq!(
            keys(&r.recognize("flash of light metal")),
            vec![(EntityKind::Genre, "metal")]
        );
        assert!(r.recognize("clear bright tone").is_empty());
    }

    #[test]
    fn name_threshold_is_configurable() {
        let t = tables();
        let loose = EngineConfig {
            name_fuzzy_threshold: 0.8,
            ..EngineConfig::default()
        };
        let r = EntityRecognizer::new(&t, &loose);
        assert_eq!(
            keys(&r.recognize("great price")),
            vec![(EntityKind::Artist, "prince")]
        );
    }

    #[test]
    fn long_queries_still_find_trailing_entities() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        let query = format!("{} marshall plexi", "some rather ordinary words ".repeat(2_000));
        let found = r.recognize(&query);
        assert_eq!(
            keys(&found),
            vec![(EntityKind::Gear, "marshall"), (EntityKind::Gear, "plexi")]
        );
        assert_eq!(found[0].position, 8_000);
    }

    #[test]
    fn short_aliases_need_exact_match() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        assert!(r.recognize("vex").is_empty());
        assert_eq!(keys(&r.recognize("vox")), vec![(EntityKind::Gear, "vox")]);
    }

    #[test]
    fn longest_alias_wins_and_tokens_are_not_reused() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        assert_eq!(
            keys(&r.recognize("fuzz face into heavy metal")),
            vec![(EntityKind::Gear, "fuzz face"), (EntityKind::Genre, "metal")]
        );
        assert_eq!(
            keys(&r.recognize("jazz chorus amp")),
            vec![(EntityKind::Gear, "jc120")]
        );
    }

    #[test]
    fn same_key_is_reported_once_at_first_position() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        let found = r.recognize("marshall into a marshall 4x12 with mesa");
        assert_eq!(
            keys(&found),
            vec![(EntityKind::Gear, "marshall"), (EntityKind::Gear, "mesa")]
        );
        assert_eq!(found[0].position, 0);
    }

    #[test]
    fn implied_gear_only_on_artist_and_gear() {
        let t = tables();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        for e in r.recognize("bb king blues") {
            match e.kind {
                EntityKind::Artist => assert!(!e.implied_gear.is_empty()),
                _ => assert!(e.implied_gear.is_empty()),
            }
        }
    }

    #[test]
    fn characteristics_come_in_fixed_order() {
        assert_eq!(
            characteristics("Warm, dirty LEAD tone; bright and warm"),
            vec!["lead", "distorted", "bright", "warm"]
        );
        assert!(characteristics("leading brightness").is_empty());
        assert!(characteristics("").is_empty());
    }

    #[test]
    fn works_with_substituted_tables() {
        let t = LookupTables::from_json(
            r#"{ "gear": [ { "key": "widget", "aliases": ["widget"], "implies": { "amp": ["w"] } } ] }"#,
        )
        .unwrap();
        let r = EntityRecognizer::new(&t, &EngineConfig::default());
        assert_eq!(keys(&r.recognize("my widgett")), vec![(EntityKind::Gear, "widget")]);
        assert!(r.recognize("marshall").is_empty());
    }
}
