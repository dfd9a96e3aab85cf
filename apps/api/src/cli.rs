use clap::{Parser, Subcommand, ValueEnum};

/// One binary for the HTTP service and every batch stage.
#[derive(Debug, Parser)]
#[command(name = "jobrec-api", version, about = "Job recommendation pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Merge per-record parts under dataset/ into the training/ corpora
    IngestMerge,
    /// Embed the training corpora into processed/*.npy
    Embed,
    /// Label, train and publish a model archive
    Train,
    /// Print recommendations for one user as JSON
    Recommend {
        #[arg(long)]
        user_id: String,

        /// Overrides TOP_K
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Submit a batch job to the managed compute service
    Submit {
        #[arg(value_enum)]
        job: SubmitTarget,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubmitTarget {
    Processing,
    Training,
}
