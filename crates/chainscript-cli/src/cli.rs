use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chainscript",
    about = "ChainScript: collaborative stories on verified hash chains",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// JSON file holding every story
    #[arg(long, global = true, default_value = "chainscript.json")]
    pub store: PathBuf,

    /// TOML ledger configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty story store
    Init(InitArgs),
    /// Start a new story or branch
    CreateStory(CreateStoryArgs),
    /// Submit a passage as a pending block
    Submit(SubmitArgs),
    /// Co-sign a pending block
    Verify(VerifyArgs),
    /// List stories
    List,
    /// Show a story's finalized chain
    Chain(StoryArgs),
    /// Show a story's pending blocks
    Pending(StoryArgs),
    /// Print a story's finalized text
    Text(StoryArgs),
    /// Check chain integrity
    Validate(ValidateArgs),
    /// Show the branch forest
    Lineage,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing store
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CreateStoryArgs {
    pub title: String,
    #[arg(long)]
    pub parent_story: Option<String>,
    /// Finalized block the story branches from
    #[arg(long)]
    pub parent_block: Option<String>,
}

#[derive(Args)]
pub struct SubmitArgs {
    pub story: String,
    #[arg(short, long)]
    pub author: String,
    /// Read the passage from a file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Finalized block this passage branches from
    #[arg(long)]
    pub branch_from: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub story: String,
    /// Block hash or unique hash prefix
    pub block: String,
    #[arg(long)]
    pub verifier: String,
}

#[derive(Args)]
pub struct StoryArgs {
    pub story: String,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Only this story; all stories when omitted
    pub story: Option<String>,
}
