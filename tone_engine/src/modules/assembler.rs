use crate::modules::error::EngineError;
use crate::modules::protocol::{
    BlockInstance, CatalogEntry, Category, ParamValue, RecognizedEntity, ResolutionSource, ToneSpec,
};
use std::collections::BTreeSet;

/// One selected entry with its synthesized values.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub entry: &'a CatalogEntry,
    pub source: ResolutionSource,
    pub parameters: Vec<ParamValue>,
}

/// Everything the assembler needs for one query.
#[derive(Debug, Clone)]
pub struct Assembly<'a> {
    pub query: String,
    pub seed: u64,
    pub genre: Option<String>,
    pub entities: Vec<RecognizedEntity>,
    pub characteristics: Vec<String>,
    pub required: BTreeSet<Category>,
    pub omitted: BTreeSet<Category>,
    pub selections: Vec<Selection<'a>>,
}

/// Order blocks along the signal chain and check the result before handing
/// it out. No lookups and no randomness happen here.
pub fn assemble(assembly: Assembly<'_>) -> Result<ToneSpec, EngineError> {
    let Assembly {
        query,
        seed,
        genre,
        entities,
        characteristics,
        required,
        omitted,
        mut selections,
    } = assembly;

    selections.sort_by_key(|s| s.entry.category);

    let mut seen = BTreeSet::new();
    let mut blocks = Vec::with_capacity(selections.len());
    for sel in selections {
        let category = sel.entry.category;
        if !seen.insert(category) {
            return Err(EngineError::DuplicateCategory { category });
        }
        if omitted.contains(&category) || !required.contains(&category) {
            return Err(EngineError::UnexpectedCategory { category });
        }
        blocks.push(block(sel)?);
    }

    if let Some(&category) = required.difference(&seen).next() {
        return Err(EngineError::MissingCategory { category });
    }

    let description = describe(genre.as_deref(), &characteristics, &blocks);
    Ok(ToneSpec {
        query,
        seed,
        genre,
        entities,
        characteristics,
        blocks,
        description,
    })
}

fn block(sel: Selection<'_>) -> Result<BlockInstance, EngineError> {
    let entry = sel.entry;
    let mut parameters = Vec::with_capacity(sel.parameters.len());
    for value in sel.parameters {
        let Some(spec) = entry.param(&value.name) else {
            return Err(EngineError::UnknownParam {
                category: entry.category,
                model: entry.display_name.clone(),
                param: value.name,
            });
        };
        if !spec.contains(value.value) {
            return Err(EngineError::ValueOutOfRange {
                category: entry.category,
                model: entry.display_name.clone(),
                param: value.name,
                value: value.value,
                min: spec.min,
                max: spec.max,
            });
        }
        parameters.push(value);
    }
    let order = |p: &ParamValue| {
        entry
            .parameter_schema
            .iter()
            .position(|s| s.name == p.name)
            .unwrap_or(usize::MAX)
    };
    parameters.sort_by_key(order);

    Ok(BlockInstance {
        category: entry.category,
        model: entry.display_name.clone(),
        real_world: entry.real_world.clone(),
        source: sel.source,
        parameters,
    })
}

/// "A blues tone using Deluxe Verb Normal into 1x12 Deluxe Oxford, with T808 OD
/// and Spring Large, featuring lead, warm."
pub fn describe(genre: Option<&str>, characteristics: &[String], blocks: &[BlockInstance]) -> String {
    let model = |c: Category| blocks.iter().find(|b| b.category == c).map(|b| b.model.as_str());

    let mut out = match genre {
        Some(g) => format!("A {g} tone"),
        None => "A tone".to_string(),
    };
    if let Some(amp) = model(Category::Amp) {
        out.push_str(&format!(" using {amp}"));
        if let Some(cab) = model(Category::Cab) {
            out.push_str(&format!(" into {cab}"));
        }
    }

    let effects: Vec<&str> = [
        Category::Drive,
        Category::Modulation,
        Category::Delay,
        Category::Reverb,
    ]
    .into_iter()
    .filter_map(model)
    .collect();
    match effects.as_slice() {
        [] => {}
        [one] => out.push_str(&format!(", with {one}")),
        [init @ .., last] => out.push_str(&format!(", with {} and {last}", init.join(", "))),
    }
    if !characteristics.is_empty() {
        out.push_str(&format!(", featuring {}", characteristics.join(", ")));
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::protocol::ParamSpec;

    fn entry(category: Category, name: &str) -> CatalogEntry {
        CatalogEntry {
            category,
            display_name: name.to_string(),
            real_world: None,
            brand_tags: BTreeSet::new(),
            genre_affinity: BTreeSet::new(),
            parameter_schema: vec![
                ParamSpec {
                    name: "a".to_string(),
                    min: 0.0,
                    max: 10.0,
                    default: 5.0,
                    unit: String::new(),
                    step: None,
                },
                ParamSpec {
                    name: "b".to_string(),
                    min: 0.0,
                    max: 1.0,
                    default: 0.5,
                    unit: String::new(),
                    step: None,
                },
            ],
        }
    }

    fn value(name: &str, v: f64) -> ParamValue {
        ParamValue {
            name: name.to_string(),
            value: v,
            unit: String::new(),
        }
    }

    fn selection(entry: &CatalogEntry) -> Selection<'_> {
        Selection {
            entry,
            source: ResolutionSource::Unrestricted,
            parameters: vec![value("b", 0.2), value("a", 3.0)],
        }
    }

    fn assembly<'a>(selections: Vec<Selection<'a>>, required: &[Category]) -> Assembly<'a> {
        Assembly {
            query: "q".to_string(),
            seed: 1,
            genre: Some("blues".to_string()),
            entities: Vec::new(),
            characteristics: Vec::new(),
            required: required.iter().copied().collect(),
            omitted: BTreeSet::new(),
            selections,
        }
    }

    #[test]
    fn orders_blocks_and_params() {
        let reverb = entry(Category::Reverb, "Spring Large");
        let amp = entry(Category::Amp, "Deluxe Verb Normal");
        let drive = entry(Category::Drive, "T808 OD");
        let spec = assemble(assembly(
            vec![selection(&reverb), selection(&amp), selection(&drive)],
            &[Category::Amp, Category::Drive, Category::Reverb],
        ))
        .unwrap();
        assert_eq!(
            spec.categories(),
            vec![Category::Drive, Category::Amp, Category::Reverb]
        );
        let names: Vec<&str> = spec.blocks[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            spec.description,
            "A blues tone using Deluxe Verb Normal, with T808 OD and Spring Large."
        );
    }

    #[test]
    fn rejects_structural_violations() {
        let amp = entry(Category::Amp, "A");
        let amp2 = entry(Category::Amp, "B");
        let cab = entry(Category::Cab, "C");

        let dup = assemble(assembly(vec![selection(&amp), selection(&amp2)], &[Category::Amp]));
        assert_eq!(dup.unwrap_err(), EngineError::DuplicateCategory { category: Category::Amp });

        let missing = assemble(assembly(vec![selection(&amp)], &[Category::Amp, Category::Cab]));
        assert_eq!(missing.unwrap_err(), EngineError::MissingCategory { category: Category::Cab });

        let mut omitted = assembly(vec![selection(&amp), selection(&cab)], &[Category::Amp, Category::Cab]);
        omitted.omitted.insert(Category::Cab);
        assert_eq!(
            assemble(omitted).unwrap_err(),
            EngineError::UnexpectedCategory { category: Category::Cab }
        );
    }

    #[test]
    fn rejects_bad_values() {
        let amp = entry(Category::Amp, "A");
        let mut sel = selection(&amp);
        sel.parameters[1].value = 11.0;
        let err = assemble(assembly(vec![sel], &[Category::Amp])).unwrap_err();
        assert!(matches!(err, EngineError::ValueOutOfRange { ref param, .. } if param == "a"));

        let mut sel = selection(&amp);
        sel.parameters.push(value("c", 0.0));
        let err = assemble(assembly(vec![sel], &[Category::Amp])).unwrap_err();
        assert!(matches!(err, EngineError::UnknownParam { .. }));
    }

    #[test]
    fn describe_without_genre_or_effects() {
        assert_eq!(describe(None, &[], &[]), "A tone.");
    }

    #[test]
    fn describe_appends_characteristics() {
        let amp = entry(Category::Amp, "Brit 800");
        let mut a = assembly(vec![selection(&amp)], &[Category::Amp]);
        a.genre = None;
        a.characteristics = vec!["lead".to_string(), "bright".to_string()];
        let spec = assemble(a).unwrap();
        assert_eq!(spec.description, "A tone using Brit 800, featuring lead, bright.");
        assert_eq!(spec.characteristics, vec!["lead", "bright"]);
    }
}
