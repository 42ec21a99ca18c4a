//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Moor - export live platform configuration as declarative artifacts
/// and verify the round trip
#[derive(Parser)]
#[command(name = "moor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the live configuration into a declarative artifact set
    Export(ExportArgs),

    /// Validate an attribute mapping against a kind's schema
    Validate(ValidateArgs),

    /// Run the apply/adopt/plan round trip against exported artifacts
    Verify(VerifyArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Credential selection, shared by commands that talk to the platform.
#[derive(Args)]
pub struct CredentialArgs {
    /// Deployment URL of the platform
    #[arg(long, env = "MOOR_DEPLOYMENT_URL")]
    pub deployment_url: String,

    /// Per-user API key
    #[arg(long, env = "MOOR_API_KEY")]
    pub api_key: Option<String>,

    /// Partner key (requires --deployment-key)
    #[arg(long, env = "MOOR_PARTNER_KEY")]
    pub partner_key: Option<String>,

    /// Deployment key (requires --partner-key)
    #[arg(long, env = "MOOR_DEPLOYMENT_KEY")]
    pub deployment_key: Option<String>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output directory for the artifact set
    #[arg(short, long, default_value = "moor-export")]
    pub out_dir: PathBuf,

    /// Replace existing files in the output directory
    #[arg(long)]
    pub force: bool,

    /// Restrict the export to one organization
    #[arg(long)]
    pub org: Option<String>,

    /// Include role and policy object kinds
    #[arg(long)]
    pub include_permissions: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Object kind the mapping targets (connection, sync, job, role,
    /// policy, alerting)
    pub kind: String,

    /// Path to a JSON mapping file
    pub mapping: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Directory holding a previously exported artifact set
    pub artifact_dir: PathBuf,

    /// Path to the declarative engine binary (searched on PATH otherwise)
    #[arg(long)]
    pub engine: Option<PathBuf>,

    /// Keep the scratch workspace for debugging
    #[arg(long)]
    pub keep: bool,

    /// Dotted attribute path to exclude from field comparison (repeatable)
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,

    /// Per-invocation engine timeout in seconds
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
