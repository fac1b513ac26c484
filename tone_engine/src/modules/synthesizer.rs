use crate::modules::error::EngineError;
use crate::modules::protocol::{params, CatalogEntry, Category, ParamSpec, ParamValue};
use rand::Rng;
use std::collections::BTreeSet;

/// Per-query directives the synthesizer applies on top of each schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisContext {
    /// Dominant style, if any.
    pub genre: Option<String>,
    /// Style names tried in order when looking up a parameter profile.
    pub styles: Vec<String>,
    /// Categories whose intensity parameters are pinned to their minimum.
    pub force_min_intensity: BTreeSet<Category>,
}

impl SynthesisContext {
    fn profile(&self) -> Option<&'static [Band]> {
        self.styles.iter().find_map(|s| profile_for(s))
    }
}

/// Target band for one parameter, as fractions of its declared range.
#[derive(Debug, Clone, Copy)]
struct Band {
    category: Category,
    param: &'static str,
    lo: f64,
    hi: f64,
}

const fn band(category: Category, param: &'static str, lo: f64, hi: f64) -> Band {
    Band {
        category,
        param,
        lo,
        hi,
    }
}

mod profiles {
    use super::{band, Band};
    use crate::modules::protocol::params::{amp, drive};
    use crate::modules::protocol::Category::{Amp, Drive};

    pub const METAL: &[Band] = &[
        band(Amp, amp::GAIN, 0.75, 0.95),
        band(Amp, amp::BASS, 0.6, 0.8),
        band(Amp, amp::MID, 0.3, 0.5),
        band(Amp, amp::TREBLE, 0.6, 0.8),
        band(Amp, amp::PRESENCE, 0.6, 0.8),
        band(Amp, amp::MASTER, 0.2, 0.6),
        band(Drive, drive::DRIVE, 0.7, 1.0),
    ];

    pub const ROCK: &[Band] = &[
        band(Amp, amp::GAIN, 0.5, 0.8),
        band(Amp, amp::BASS, 0.5, 0.7),
        band(Amp, amp::MID, 0.5, 0.7),
        band(Amp, amp::TREBLE, 0.6, 0.8),
        band(Amp, amp::PRESENCE, 0.5, 0.7),
        band(Amp, amp::MASTER, 0.4, 0.7),
        band(Drive, drive::DRIVE, 0.4, 0.8),
    ];

    pub const BLUES: &[Band] = &[
        band(Amp, amp::GAIN, 0.4, 0.7),
        band(Amp, amp::BASS, 0.4, 0.6),
        band(Amp, amp::MID, 0.6, 0.8),
        band(Amp, amp::TREBLE, 0.5, 0.7),
        band(Amp, amp::PRESENCE, 0.4, 0.6),
        band(Amp, amp::MASTER, 0.5, 0.8),
        band(Drive, drive::DRIVE, 0.3, 0.7),
    ];

    pub const JAZZ: &[Band] = &[
        band(Amp, amp::GAIN, 0.1, 0.35),
        band(Amp, amp::BASS, 0.5, 0.7),
        band(Amp, amp::MID, 0.4, 0.6),
        band(Amp, amp::TREBLE, 0.3, 0.5),
        band(Amp, amp::PRESENCE, 0.2, 0.4),
        band(Amp, amp::MASTER, 0.7, 1.0),
    ];

    pub const CLEAN: &[Band] = &[
        band(Amp, amp::GAIN, 0.05, 0.3),
        band(Amp, amp::TREBLE, 0.5, 0.7),
        band(Amp, amp::MASTER, 0.6, 0.9),
    ];
}

fn profile_for(style: &str) -> Option<&'static [Band]> {
    match style {
        "metal" | "shred" | "djent" | "thrash" => Some(profiles::METAL),
        "rock" | "hard rock" | "classic rock" | "punk" | "grunge" | "stoner" => Some(profiles::ROCK),
        "blues" => Some(profiles::BLUES),
        "jazz" => Some(profiles::JAZZ),
        "clean" | "country" | "funk" | "surf" => Some(profiles::CLEAN),
        _ => None,
    }
}

/// Produces in-range values for a selected entry's schema.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSynthesizer {
    variation: f64,
}

impl ParameterSynthesizer {
    pub fn new(variation: f64) -> Self {
        let variation = if variation.is_finite() {
            variation.clamp(0.0, 0.5)
        } else {
            0.0
        };
        Self { variation }
    }

    /// Values in schema order. Every value is checked against its range
    /// before it leaves this function.
    pub fn synthesize<R: Rng>(
        &self,
        entry: &CatalogEntry,
        ctx: &SynthesisContext,
        rng: &mut R,
    ) -> Result<Vec<ParamValue>, EngineError> {
        let profile = ctx.profile();
        let pinned = ctx.force_min_intensity.contains(&entry.category);

        let mut out = Vec::with_capacity(entry.parameter_schema.len());
        for spec in &entry.parameter_schema {
            let raw = if pinned && params::INTENSITY.contains(&spec.name.as_str()) {
                spec.min
            } else if let Some(b) = profile.and_then(|p| {
                p.iter()
                    .find(|b| b.category == entry.category && b.param == spec.name)
            }) {
                spec.min + spec.span() * rng.gen_range(b.lo..=b.hi)
            } else {
                self.perturb(spec, rng)
            };

            let value = quantize(spec, raw);
            if !spec.contains(value) {
                return Err(EngineError::ValueOutOfRange {
                    category: entry.category,
                    model: entry.display_name.clone(),
                    param: spec.name.clone(),
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            }
            out.push(ParamValue {
                name: spec.name.clone(),
                value,
                unit: spec.unit.clone(),
            });
        }
        Ok(out)
    }

    fn perturb<R: Rng>(&self, spec: &ParamSpec, rng: &mut R) -> f64 {
        let half = self.variation * spec.span();
        if !half.is_finite() || half <= 0.0 {
            return spec.default;
        }
        (spec.default + rng.gen_range(-half..=half)).clamp(spec.min, spec.max)
    }
}

/// Snap to `step` when declared, else round to one decimal. Never leaves
/// `[min, max]`.
fn quantize(spec: &ParamSpec, raw: f64) -> f64 {
    let raw = raw.clamp(spec.min, spec.max);
    match spec.step {
        Some(step) => {
            let k = ((raw - spec.min) / step).round();
            let mut v = spec.min + k * step;
            if v > spec.max {
                v -= step;
            }
            v.clamp(spec.min, spec.max)
        }
        None => {
            let rounded = (raw * 10.0).round() / 10.0;
            if spec.contains(rounded) {
                rounded
            } else {
                raw
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spec(name: &str, min: f64, max: f64, default: f64, step: Option<f64>) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            min,
            max,
            default,
            unit: String::new(),
            step,
        }
    }

    fn entry(category: Category, schema: Vec<ParamSpec>) -> CatalogEntry {
        CatalogEntry {
            category,
            display_name: "Test".to_string(),
            real_world: None,
            brand_tags: BTreeSet::new(),
            genre_affinity: BTreeSet::new(),
            parameter_schema: schema,
        }
    }

    fn amp() -> CatalogEntry {
        entry(
            Category::Amp,
            vec![
                spec("gain", 0.0, 10.0, 5.0, None),
                spec("mid", 0.0, 10.0, 5.0, None),
                spec("level", -20.0, 20.0, 0.0, None),
            ],
        )
    }

    fn styled(style: &str) -> SynthesisContext {
        SynthesisContext {
            genre: Some(style.to_string()),
            styles: vec![style.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn stays_in_range_across_many_seeds() {
        let synth = ParameterSynthesizer::new(0.5);
        let e = entry(
            Category::Delay,
            vec![
                spec("time", 1.0, 2000.0, 1999.0, Some(1.0)),
                spec("tight", 0.11, 0.14, 0.12, None),
                spec("edge", 0.0, 1.0, 1.0, Some(0.3)),
            ],
        );
        for seed in 0..500 {
            let mut rng = StdRng::seed_from_u64(seed);
            let values = synth.synthesize(&e, &SynthesisContext::default(), &mut rng).unwrap();
            for (v, s) in values.iter().zip(&e.parameter_schema) {
                assert!(s.contains(v.value), "{} = {} outside range", s.name, v.value);
            }
        }
    }

    #[test]
    fn metal_profile_pushes_gain_up_and_jazz_down() {
        let synth = ParameterSynthesizer::new(0.12);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let metal = synth.synthesize(&amp(), &styled("metal"), &mut rng).unwrap();
            assert!(metal[0].value >= 7.5 && metal[0].value <= 9.5);
            let jazz = synth.synthesize(&amp(), &styled("jazz"), &mut rng).unwrap();
            assert!(jazz[0].value >= 1.0 && jazz[0].value <= 3.5);
        }
    }

    #[test]
    fn unknown_style_perturbs_around_default() {
        let synth = ParameterSynthesizer::new(0.1);
        let mut rng = StdRng::seed_from_u64(7);
        let values = synth.synthesize(&amp(), &styled("polka"), &mut rng).unwrap();
        assert!((values[0].value - 5.0).abs() <= 1.0 + 1e-9);
        assert!(values[2].value.abs() <= 4.0 + 1e-9);
    }

    #[test]
    fn zero_variation_returns_defaults() {
        let synth = ParameterSynthesizer::new(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let values = synth.synthesize(&amp(), &SynthesisContext::default(), &mut rng).unwrap();
        assert_eq!(values.iter().map(|v| v.value).collect::<Vec<_>>(), vec![5.0, 5.0, 0.0]);
    }

    #[test]
    fn pinned_intensity_goes_to_minimum() {
        let synth = ParameterSynthesizer::new(0.12);
        let e = entry(
            Category::Drive,
            vec![
                spec("drive", 1.0, 10.0, 5.0, None),
                spec("fuzz", 0.0, 10.0, 7.0, None),
                spec("tone", 0.0, 10.0, 5.0, None),
            ],
        );
        let mut ctx = styled("metal");
        ctx.force_min_intensity.insert(Category::Drive);
        let mut rng = StdRng::seed_from_u64(3);
        let values = synth.synthesize(&e, &ctx, &mut rng).unwrap();
        assert_eq!(values[0].value, 1.0);
        assert_eq!(values[1].value, 0.0);
        assert!(values[2].value > 0.0);
    }

    #[test]
    fn quantize_snaps_and_rounds_inside_range() {
        let s = spec("time", 1.0, 2000.0, 400.0, Some(1.0));
        assert_eq!(quantize(&s, 400.4), 400.0);
        assert_eq!(quantize(&s, 5000.0), 2000.0);

        let coarse = spec("x", 0.0, 1.0, 0.0, Some(0.3));
        assert!((quantize(&coarse, 0.99) - 0.9).abs() < 1e-9);

        let narrow = spec("n", 0.11, 0.14, 0.12, None);
        let v = quantize(&narrow, 0.13);
        assert!(narrow.contains(v));
        assert_eq!(quantize(&spec("g", 0.0, 10.0, 5.0, None), 6.66), 6.7);
    }
}
