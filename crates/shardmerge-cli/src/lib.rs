//! Command-line harness for merging shard search responses
//!
//! Reads a JSON file holding one locally ranked response per shard, merges
//! them through [`MergeQueueManager`] and prints the requested page.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use shardmerge_core::{
    MergeError, MergeQueueManager, MergeStats, MergeStrategy, MergeTier, PageSpec, ReRankConfig,
    ShardDoc, ShardDocOrdering, SortSpec, SortValue,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "shardmerge", version, about = "Merge per-shard search responses into one page")]
pub struct Cli {
    /// Log at debug level (overridden by `RUST_LOG`)
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge shard responses from a JSON file
    Merge(MergeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Path to the shard responses
    pub input: PathBuf,
    /// Rows to skip before the returned page
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,
    /// Rows in the returned page
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    pub count: i64,
    /// Sort, e.g. `price asc, score desc` (relevance when empty)
    #[arg(long, default_value = "")]
    pub sort: String,
    /// Re-rank window size (defaults to `SHARDMERGE_RERANK_DOCS`, then 200)
    #[arg(long, allow_negative_numbers = true, conflicts_with = "no_rerank")]
    pub rerank_docs: Option<i64>,
    /// Disable the re-rank tier
    #[arg(long)]
    pub no_rerank: bool,
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// One hit in a shard response file.
#[derive(Debug, Clone, Deserialize)]
pub struct InputDoc {
    pub id: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub sort_values: BTreeMap<String, SortValue>,
}

/// One shard's response, in the shard's own rank order.
#[derive(Debug, Clone, Deserialize)]
pub struct ShardResponse {
    pub shard: String,
    #[serde(default)]
    pub docs: Vec<InputDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeInput {
    pub shards: Vec<ShardResponse>,
}

impl MergeInput {
    pub fn load(path: &Path) -> CliResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Shard names key the same-shard comparison, so they must be unique.
    pub fn check_unique_shards(&self) -> CliResult<()> {
        let mut seen = BTreeSet::new();
        for response in &self.shards {
            if !seen.insert(response.shard.as_str()) {
                return Err(CliError::InvalidArgument(format!(
                    "shard {:?} appears more than once",
                    response.shard
                )));
            }
        }
        Ok(())
    }

    /// Flatten into shard documents, numbering each shard's hits from 0.
    pub fn into_docs(self) -> impl Iterator<Item = ShardDoc> {
        self.shards.into_iter().flat_map(|response| {
            let shard = response.shard;
            response
                .docs
                .into_iter()
                .enumerate()
                .map(move |(order, doc)| ShardDoc {
                    id: doc.id,
                    shard: shard.clone(),
                    order_in_shard: order,
                    score: doc.score,
                    sort_values: doc.sort_values,
                })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedHit {
    pub position: usize,
    pub tier: MergeTier,
    pub shard: String,
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutput {
    pub strategy: MergeStrategy,
    pub sort: String,
    pub result_size: isize,
    pub stats: MergeStats,
    pub hits: Vec<MergedHit>,
}

impl MergeOutput {
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "strategy={} sort=\"{}\" result_size={} offered={} dropped={}\n",
            self.strategy, self.sort, self.result_size, self.stats.offered, self.stats.dropped
        );
        for hit in &self.hits {
            let _ = writeln!(
                out,
                "{:>4}  {:<7}  {:<12}  {:<16}  {:.4}",
                hit.position, hit.tier, hit.shard, hit.id, hit.score
            );
        }
        out
    }
}

fn rerank_config(args: &MergeArgs) -> CliResult<Option<ReRankConfig>> {
    if args.no_rerank {
        return Ok(None);
    }
    match args.rerank_docs {
        Some(n) => Ok(Some(ReRankConfig::from_signed(n)?)),
        None => Ok(Some(ReRankConfig::from_env())),
    }
}

/// Run one merge and collect the drained hits.
pub fn run_merge(args: &MergeArgs) -> CliResult<MergeOutput> {
    let page = PageSpec::from_signed(args.offset, args.count)?;
    let sort: SortSpec = args.sort.parse()?;
    let rerank = rerank_config(args)?;
    let input = MergeInput::load(&args.input)?;
    input.check_unique_shards()?;
    tracing::debug!(
        path = %args.input.display(),
        shards = input.shards.len(),
        sort = %sort,
        "loaded shard responses"
    );

    let mut manager =
        MergeQueueManager::new(ShardDocOrdering::new(sort.clone()), page, rerank.as_ref())?;
    for doc in input.into_docs() {
        let shard_index = doc.order_in_shard;
        manager.add_document(doc, shard_index)?;
    }

    let result_size = manager.result_size(page.offset);
    let hits = std::iter::from_fn(|| manager.next_ranked())
        .enumerate()
        .map(|(position, (tier, doc))| MergedHit {
            position,
            tier,
            shard: doc.shard,
            id: doc.id,
            score: doc.score,
        })
        .collect();

    Ok(MergeOutput {
        strategy: manager.strategy(),
        sort: sort.to_string(),
        result_size,
        stats: manager.stats(),
        hits,
    })
}

fn execute(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Merge(args) => {
            let output = run_merge(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!("{}", output.render_text());
            }
            Ok(())
        }
    }
}

fn err_exit_code(err: &CliError) -> i32 {
    match err {
        CliError::InvalidArgument(_) | CliError::Merge(_) => 2,
        CliError::Io(_) | CliError::Json(_) => 1,
    }
}

pub fn run_cli(cli: Cli) -> i32 {
    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err_exit_code(&err)
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
