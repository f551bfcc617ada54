use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::LanguageFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mtsurvey",
    version,
    about = "Collect human judgments of machine translations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank every translation of each source text.
    Rank(SessionArgs),
    /// Pick the better of two randomly sampled translations.
    Compare(SessionArgs),
    /// Pivot per-translator comparison exports into the survey dataset.
    Merge(MergeArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    #[arg(long, default_value = "merged_translation_data.csv")]
    pub data_path: PathBuf,

    #[arg(long, default_value = "translation_quality_results.csv")]
    pub results_path: PathBuf,

    /// JSON file with `{"systems": [...]}` replacing the MT system columns.
    #[arg(long)]
    pub schema_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LanguageFilter::Both)]
    pub filter: LanguageFilter,

    /// Seed for question order and candidate shuffling.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long, default_value = "translation_results")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "dist/merged_translation_data.csv")]
    pub output_path: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "merged_translation_data.csv")]
    pub data_path: PathBuf,

    #[arg(long, default_value = "translation_quality_results.csv")]
    pub results_path: PathBuf,

    #[arg(long)]
    pub schema_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
