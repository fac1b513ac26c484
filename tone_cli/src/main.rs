use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tone_engine::catalog::Catalog;
use tone_engine::config::EngineConfig;
use tone_engine::protocol::{BlockInstance, EntityKind, RecognizedEntity, ResolutionSource, ToneSpec};
use tone_engine::tables::LookupTables;
use tone_engine::ToneEngine;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tone_cli")]
struct Args {
    #[arg(long, required_unless_present = "query_file")]
    query: Option<String>,

    /// Read the query from a file.
    #[arg(long, value_name = "PATH", conflicts_with = "query")]
    query_file: Option<PathBuf>,

    /// Fixed seed; the same query and seed always give the same tone.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = false)]
    json: bool,

    /// Catalog JSON to use instead of the built-in one.
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Artist/gear/genre tables JSON to use instead of the built-in ones.
    #[arg(long, value_name = "PATH")]
    tables: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let query = if let Some(q) = args.query.clone() {
        q
    } else {
        let path = args
            .query_file
            .clone()
            .ok_or_else(|| anyhow::anyhow!("missing --query or --query-file"))?;
        read(&path)?
    };

    let catalog = match args.catalog.as_deref() {
        Some(path) => Catalog::from_json(&read(path)?)
            .map_err(|e| anyhow::anyhow!("catalog {}: {e}", path.display()))?,
        None => Catalog::builtin()?,
    };
    let tables = match args.tables.as_deref() {
        Some(path) => LookupTables::from_json(&read(path)?)
            .map_err(|e| anyhow::anyhow!("tables {}: {e}", path.display()))?,
        None => LookupTables::builtin()?,
    };
    let engine = ToneEngine::new(Arc::new(catalog), Arc::new(tables), EngineConfig::from_env());
    tracing::debug!(
        models = engine.catalog().model_count(),
        artists = engine.tables().artists.len(),
        config = ?engine.config(),
        "engine ready"
    );

    let tone = engine
        .generate_tone(&query, args.seed)
        .map_err(|e| {
            let category = e.category();
            tracing::error!(%category, error = %e, "tone generation failed");
            anyhow::anyhow!("internal error in the {category} block: {e}")
        })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tone)?);
    } else {
        print_tone(&tone);
    }
    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))
}

fn print_tone(tone: &ToneSpec) {
    println!("{}", tone.description);
    println!("seed: {}", tone.seed);
    if tone.entities.is_empty() {
        println!("entities: none");
    } else {
        println!("entities:");
        for e in &tone.entities {
            println!("  {}", entity_line(e));
        }
    }
    println!("chain:");
    for block in &tone.blocks {
        print_block(block);
    }
}

fn entity_line(e: &RecognizedEntity) -> String {
    let kind = match e.kind {
        EntityKind::Artist => "artist",
        EntityKind::Gear => "gear",
        EntityKind::Genre => "genre",
    };
    let fuzzy = if e.fuzzy { " (fuzzy)" } else { "" };
    format!("{kind:<6} {:<20} <- \"{}\"{fuzzy}", e.canonical_key, e.matched)
}

fn source_label(source: ResolutionSource) -> &'static str {
    match source {
        ResolutionSource::Gear => "gear",
        ResolutionSource::Artist => "artist",
        ResolutionSource::Genre => "genre",
        ResolutionSource::Unrestricted => "any",
    }
}

fn print_block(block: &BlockInstance) {
    match &block.real_world {
        Some(rw) => println!(
            "  [{}] {} ({rw}) via {}",
            block.category,
            block.model,
            source_label(block.source)
        ),
        None => println!(
            "  [{}] {} via {}",
            block.category,
            block.model,
            source_label(block.source)
        ),
    }
    for p in &block.parameters {
        println!("      {:<16} = {:>9.1} {}", p.name, p.value, p.unit);
    }
}
