use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A functional slot in the signal chain. Variant order is the chain order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Input,
    Drive,
    Amp,
    Cab,
    #[serde(alias = "mod")]
    Modulation,
    Delay,
    Reverb,
    Output,
}

impl Category {
    pub const SIGNAL_CHAIN: [Category; 8] = [
        Category::Input,
        Category::Drive,
        Category::Amp,
        Category::Cab,
        Category::Modulation,
        Category::Delay,
        Category::Reverb,
        Category::Output,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Input => "input",
            Category::Drive => "drive",
            Category::Amp => "amp",
            Category::Cab => "cab",
            Category::Modulation => "modulation",
            Category::Delay => "delay",
            Category::Reverb => "reverb",
            Category::Output => "output",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" | "in" => Some(Category::Input),
            "drive" | "drv" | "gain" => Some(Category::Drive),
            "amp" => Some(Category::Amp),
            "cab" | "cabinet" => Some(Category::Cab),
            "modulation" | "mod" => Some(Category::Modulation),
            "delay" | "dly" => Some(Category::Delay),
            "reverb" | "rev" => Some(Category::Reverb),
            "output" | "out" => Some(Category::Output),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl ParamSpec {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && self.min <= value && value <= self.max
    }

    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.default.is_finite()
            && self.min <= self.default
            && self.default <= self.max
            && self.span().is_finite()
            && self.step.map_or(true, |s| s.is_finite() && s > 0.0)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// One hardware model in the reference catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub category: Category,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_world: Option<String>,
    #[serde(default)]
    pub brand_tags: BTreeSet<String>,
    #[serde(default)]
    pub genre_affinity: BTreeSet<String>,
    #[serde(default)]
    pub parameter_schema: Vec<ParamSpec>,
}

impl CatalogEntry {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameter_schema.iter().find(|p| p.name == name)
    }

    pub fn has_any_brand(&self, tags: &BTreeSet<String>) -> bool {
        !self.brand_tags.is_disjoint(tags)
    }

    pub fn has_any_genre(&self, tags: &BTreeSet<String>) -> bool {
        !self.genre_affinity.is_disjoint(tags)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Artist,
    Gear,
    Genre,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecognizedEntity {
    pub kind: EntityKind,
    pub canonical_key: String,
    /// Surface text of the query window that matched.
    pub matched: String,
    /// Token index of the first matched token.
    pub position: usize,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub implied_gear: BTreeMap<Category, BTreeSet<String>>,
}

/// Which precedence level produced a block's candidate subset.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Gear,
    Artist,
    Genre,
    Unrestricted,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParamValue {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlockInstance {
    pub category: Category,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_world: Option<String>,
    pub source: ResolutionSource,
    pub parameters: Vec<ParamValue>,
}

impl BlockInstance {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToneSpec {
    pub query: String,
    /// Effective base seed; feeding it back reproduces this result.
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default)]
    pub entities: Vec<RecognizedEntity>,
    /// Playing-style words from the query ("lead", "bright").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characteristics: Vec<String>,
    pub blocks: Vec<BlockInstance>,
    pub description: String,
}

impl ToneSpec {
    pub fn block(&self, category: Category) -> Option<&BlockInstance> {
        self.blocks.iter().find(|b| b.category == category)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.blocks.iter().map(|b| b.category).collect()
    }
}

pub mod params {
    pub mod amp {
        pub const GAIN: &str = "gain";
        pub const BASS: &str = "bass";
        pub const MID: &str = "mid";
        pub const TREBLE: &str = "treble";
        pub const PRESENCE: &str = "presence";
        pub const MASTER: &str = "master";
    }

    pub mod drive {
        pub const DRIVE: &str = "drive";
    }

    /// Parameter names that set how hard a block saturates.
    pub const INTENSITY: &[&str] = &["drive", "gain", "distortion", "fuzz", "sustain"];
}
