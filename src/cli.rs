use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "autorank",
    version,
    about = "Automatic relevance annotation for ranking-model training data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Annotate(AnnotateArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum JudgeStrategy {
    Pointwise,
    Pairwise,
}

impl JudgeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pointwise => "pointwise",
            Self::Pairwise => "pairwise",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    #[arg(long, default_value = ".cache/autorank")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// File with one raw query per line.
    #[arg(long)]
    pub queries_path: PathBuf,

    #[arg(long, value_enum, default_value_t = JudgeStrategy::Pairwise)]
    pub strategy: JudgeStrategy,

    #[arg(long, default_value = "https://trystract.com/beta/api/search")]
    pub search_endpoint: String,

    #[arg(long, default_value = "https://api.openai.com/v1")]
    pub judge_endpoint: String,

    #[arg(long, default_value = "gpt-4-1106-preview")]
    pub judge_model: String,

    /// Environment variable holding the judge API key.
    #[arg(long, default_value = "OPENAI_API_KEY")]
    pub api_key_env: String,

    /// Optional optic program sent with every search request.
    #[arg(long)]
    pub optic_path: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub num_results: usize,

    #[arg(long, default_value_t = 5)]
    pub elo_rounds_mult: usize,

    #[arg(long, default_value_t = 4)]
    pub num_labels: u8,

    /// Independent pointwise calls averaged per candidate.
    #[arg(long, default_value_t = 1)]
    pub ensemble_size: usize,

    #[arg(long, default_value_t = 2.0)]
    pub min_delay_secs: f64,

    #[arg(long, default_value_t = 4.0)]
    pub mean_delay_secs: f64,

    /// Seed for the tournament sampler; omit for a fresh seed per run.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub max_queries: Option<usize>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/autorank")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
