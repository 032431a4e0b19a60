use clap::{Parser, Subcommand};

/// This is the batch program of the 2025 recall votes: it turns the recall spreadsheets into
/// per-village files, joins them with the 2024 legislative election and computes vote gaps.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file with the locations of the inputs and the outputs.
    /// Relative paths in this file are read from the directory of the file. See the manual of
    /// cunli_linkage for the fields.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Reads the recall spreadsheets and writes one JSON file per village, with the summaries.
    Extract {
        #[clap(flatten)]
        paths: PathArgs,
        /// (file path) A reference summary.json. If provided, the program checks that the
        /// summary it writes is the same.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Adds the village codes to the existing village files that have none.
    RefreshCodes {
        #[clap(flatten)]
        paths: PathArgs,
    },
    /// Joins the village files with the election results into a CSV table.
    Combine {
        #[clap(flatten)]
        paths: PathArgs,
    },
    /// Computes the vote gaps from the combined table.
    Gaps {
        #[clap(flatten)]
        paths: PathArgs,
    },
    /// Runs extract, combine and gaps in sequence.
    All {
        #[clap(flatten)]
        paths: PathArgs,
        /// (file path) A reference summary.json, as for extract.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
}

impl Command {
    pub fn paths(&self) -> &PathArgs {
        match self {
            Command::Extract { paths, .. } => paths,
            Command::RefreshCodes { paths } => paths,
            Command::Combine { paths } => paths,
            Command::Gaps { paths } => paths,
            Command::All { paths, .. } => paths,
        }
    }
}

/// Locations that override the ones of the configuration file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// (directory) The directory with the recall spreadsheets (.xlsx).
    #[clap(long, value_parser)]
    pub raw_directory: Option<String>,

    /// (file path) The village boundaries file (GeoJSON) holding the village codes.
    #[clap(long, value_parser)]
    pub basecode: Option<String>,

    /// (file path) The manual override file. It is created if it does not exist.
    #[clap(long, value_parser)]
    pub manual_mapping: Option<String>,

    /// (directory) Where the village files and the summaries are written.
    #[clap(short, long, value_parser)]
    pub output_directory: Option<String>,

    /// (file path) The village results of the legislative election (JSON).
    #[clap(long, value_parser)]
    pub election: Option<String>,

    /// (file path) The combined CSV table.
    #[clap(long, value_parser)]
    pub combined_csv: Option<String>,

    /// (file path) The gap table of the winners of the incumbent party.
    #[clap(long, value_parser)]
    pub incumbent_gap_csv: Option<String>,

    /// (file path) The gap table of the other winners.
    #[clap(long, value_parser)]
    pub other_gap_csv: Option<String>,

    /// (default 中國國民黨) The party whose winners are compared with the disagree votes.
    #[clap(long, value_parser)]
    pub incumbent_party: Option<String>,
}
