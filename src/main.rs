//! CLI demo for the multimodal retrieval engine.
//!
//! Uses the deterministic [`HashEmbedder`] so it runs without any model;
//! a real deployment would plug in a provider backed by one.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use modalsearch::{
    CatalogRecord, EngineConfig, HashEmbedder, HnswParams, IndexConfig, IndexKind,
    ModalityWeights, QueryEngine, QueryInput, SharedIndex, SnapshotManager, VectorIndex,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "modalsearch")]
#[command(about = "A multimodal (text + image) product search engine", long_about = None)]
struct Cli {
    /// Search backend to use
    #[arg(long, value_enum, default_value = "exact")]
    index: IndexType,

    /// Embedding dimensionality
    #[arg(long, default_value = "64")]
    dims: usize,

    /// Data directory for snapshots. If set, the index is loaded at
    /// startup and saved after each mutation.
    #[arg(long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum IndexType {
    Exact,
    Hnsw,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a catalog item (text, image file, or both)
    Ingest {
        /// Item ID
        id: String,
        /// Item description text
        #[arg(long)]
        text: Option<String>,
        /// Path to the item's image file
        #[arg(long)]
        image_file: Option<String>,
    },
    /// Search by text, image, or both
    Search {
        /// Query text
        #[arg(long)]
        text: Option<String>,
        /// Path to a query image file
        #[arg(long)]
        image_file: Option<String>,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
        /// Weight of the text score in cross-modal fusion
        #[arg(long, default_value = "0.5")]
        text_weight: f32,
        /// Weight of the image score in cross-modal fusion
        #[arg(long, default_value = "0.5")]
        image_weight: f32,
    },
    /// Remove a catalog item (both modalities)
    Remove {
        /// Item ID to remove
        id: String,
    },
    /// List all item IDs
    List,
}

fn index_kind(index: IndexType) -> IndexKind {
    match index {
        IndexType::Exact => IndexKind::Exact,
        IndexType::Hnsw => IndexKind::Hnsw(HnswParams::default()),
    }
}

fn open_index(cli: &Cli) -> Result<(SharedIndex, Option<SnapshotManager>)> {
    let kind = index_kind(cli.index);
    let Some(data_dir) = &cli.data_dir else {
        let index = VectorIndex::new(IndexConfig {
            dimensions: cli.dims,
            kind,
        })?;
        return Ok((SharedIndex::new(index), None));
    };

    let manager = SnapshotManager::new(data_dir)?;
    let index = match manager.load_blob()? {
        Some(blob) => VectorIndex::restore(kind, &blob)?,
        None => VectorIndex::new(IndexConfig {
            dimensions: cli.dims,
            kind,
        })?,
    };
    Ok((SharedIndex::new(index), Some(manager)))
}

fn save_if_persistent(index: &SharedIndex, manager: &Option<SnapshotManager>) -> Result<()> {
    if let Some(manager) = manager {
        manager.save_blob(&index.snapshot()?)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (index, snapshots) = open_index(&cli)?;
    let provider = Arc::new(HashEmbedder::new(index.dimensions()?)?);
    let engine = QueryEngine::new(provider, index.clone(), EngineConfig::default())?;

    match cli.command {
        Commands::Ingest {
            id,
            text,
            image_file,
        } => {
            let mut record = CatalogRecord::new(id.as_str());
            if let Some(text) = text {
                record = record.with_text(text);
            }
            if let Some(path) = image_file {
                record = record.with_image(std::fs::read(&path)?);
            }
            let count = engine.ingest(&record)?;
            save_if_persistent(&index, &snapshots)?;
            println!("Ingested {} with {} vector(s)", id, count);
        }
        Commands::Search {
            text,
            image_file,
            k,
            text_weight,
            image_weight,
        } => {
            let mut input = QueryInput {
                text,
                image: image_file.map(std::fs::read).transpose()?,
                weights: Some(ModalityWeights::new(text_weight, image_weight)?),
            };
            // Single-modality queries never fuse; drop the weights so
            // defaults do not mask bad flag combinations.
            if input.text.is_none() || input.image.is_none() {
                input.weights = None;
            }

            let response = engine.query(input, k)?;
            for warning in &response.warnings {
                eprintln!("warning: {:?}", warning);
            }
            if response.results.is_empty() {
                println!("No results found (index is empty)");
            } else {
                println!("Top {} results:", response.results.len());
                for result in &response.results {
                    println!("{}. {} (score: {:.4})", result.rank, result.id, result.score);
                }
            }
        }
        Commands::Remove { id } => {
            engine.remove_item(&id.as_str().into())?;
            save_if_persistent(&index, &snapshots)?;
            println!("Removed item: {}", id);
        }
        Commands::List => {
            let ids = index.item_ids()?;
            if ids.is_empty() {
                println!("No items in index");
            } else {
                println!("Item IDs ({} total):", ids.len());
                for id in ids {
                    println!("  - {}", id);
                }
            }
        }
    }

    Ok(())
}
