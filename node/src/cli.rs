//! # CLI Interface
//!
//! Defines the command-line argument structure for `ccledger-node` using
//! `clap` derive.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// ccledger federation node.
///
/// Issues assets from the node key, builds and signs transfers, and
/// validates and commits transactions into a local ledger.
#[derive(Parser, Debug)]
#[command(
    name = "ccledger-node",
    about = "ccledger federation node",
    version,
    propagate_version = true
)]
pub struct LedgerNodeCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "CCLEDGER_LOG_FORMAT", default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "ccledger_node=info,ccledger_protocol=info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a data directory, a node keypair and a config naming the
    /// node as sole federation member.
    Init(InitArgs),
    /// Print a fresh keypair.
    Keygen,
    /// Build and sign a CREATE issued by the node key.
    Create(CreateArgs),
    /// Build and sign a TRANSFER of committed outputs.
    Transfer(TransferArgs),
    /// Validate transactions and commit them as one block.
    Submit(SubmitArgs),
    /// Print a committed transaction and the spenders of its outputs.
    Show(ShowArgs),
    /// Print version information and exit.
    Version,
}

/// Where the node keeps its config, key and database.
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Node data directory.
    #[arg(long, short = 'd', env = "CCLEDGER_DATA_DIR", default_value = ".ccledger")]
    pub data_dir: PathBuf,

    /// Config file; defaults to `config.json` in the data directory.
    #[arg(long, short = 'c', env = "CCLEDGER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Additional federation members (base58 public keys).
    #[arg(long = "federation-key")]
    pub federation: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Owner of the issued output (base58 public key). Several owners
    /// share the output, all of them required to spend it.
    #[arg(long = "owner", required = true)]
    pub owners: Vec<String>,

    #[arg(long, default_value_t = 1)]
    pub amount: u64,

    /// Allow the asset to be split across outputs.
    #[arg(long)]
    pub divisible: bool,

    /// Asset data as a JSON object.
    #[arg(long)]
    pub data: Option<String>,

    /// Write the transaction here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Id of the committed transaction whose outputs are spent.
    #[arg(long)]
    pub txid: String,

    /// Output index to spend; all outputs when omitted.
    #[arg(long = "index")]
    pub indices: Vec<usize>,

    /// Base58 secret key of a current owner. Repeat for co-owners.
    #[arg(long = "secret", env = "CCLEDGER_SECRET_KEY", required = true)]
    pub secrets: Vec<String>,

    /// New owner (base58 public key). Several owners share the output.
    #[arg(long = "to", required = true)]
    pub recipients: Vec<String>,

    /// Amount for the new owners; the whole spent amount when omitted.
    #[arg(long)]
    pub amount: Option<u64>,

    /// Owner of any remainder when `--amount` is less than what is spent;
    /// defaults to the key of the first `--secret`.
    #[arg(long)]
    pub change_to: Option<String>,

    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Transaction JSON files, committed together as one block.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    pub txid: String,
}
