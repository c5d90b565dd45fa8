use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, global = true, default_value = "config.json")]
    pub config: String,

    /// Output directory for the generated site (default: from the config file).
    #[arg(long, global = true)]
    pub out: Option<String>,

    /// Without a subcommand the site is rendered.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Normalize(NormalizeArgs),
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Output file path for `posts.jsonl`.
    #[arg(long = "jsonl")]
    pub jsonl: String,
}
