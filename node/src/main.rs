// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ccledger Node
//!
//! Entry point for the `ccledger-node` binary. Parses CLI arguments,
//! initializes logging, and runs one ledger command against the local
//! data directory:
//!
//! - `init`    : data directory, node keypair and config
//! - `keygen`  : print a fresh keypair
//! - `create`  : build and sign a CREATE from the node key
//! - `transfer`: build and sign a TRANSFER of committed outputs
//! - `submit`  : validate transactions and commit them as a block
//! - `show`    : print a committed transaction
//! - `version` : print build version information

mod cli;
mod logging;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use ccledger_protocol::config::{LedgerConfig, CONFIG_FILE_NAME, PROTOCOL_VERSION};
use ccledger_protocol::crypto::{Keypair, PublicKey};
use ccledger_protocol::storage::{Block, LedgerDb, TransactionStore};
use ccledger_protocol::transaction::{Asset, OwnerSpec, Transaction};
use ccledger_protocol::validation::Validator;

use cli::{Commands, LedgerNodeCli, NodeArgs};

fn main() -> Result<()> {
    let cli = LedgerNodeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format.into());

    match cli.command {
        Commands::Init(args) => init_node(args),
        Commands::Keygen => {
            keygen();
            Ok(())
        }
        Commands::Create(args) => create(args),
        Commands::Transfer(args) => transfer(args),
        Commands::Submit(args) => submit(args),
        Commands::Show(args) => show(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Node context
// ---------------------------------------------------------------------------

/// An opened data directory: config, node key and database.
struct Node {
    config: LedgerConfig,
    keypair: Keypair,
    db: LedgerDb,
}

impl Node {
    fn open(args: &NodeArgs) -> Result<Self> {
        let config_path = config_path(args);
        let config = LedgerConfig::load(&config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;

        let secret = std::fs::read_to_string(&config.node_key_path).with_context(|| {
            format!("failed to read node key {}", config.node_key_path.display())
        })?;
        let keypair = Keypair::from_secret_base58(secret.trim())
            .with_context(|| format!("invalid node key in {}", config.node_key_path.display()))?;
        if !config.is_federation_member(&keypair.public_key()) {
            tracing::warn!(
                public_key = %keypair.public_key(),
                "node key is not a federation member; it cannot issue or sign blocks"
            );
        }

        let db = LedgerDb::open(&config.database_path).with_context(|| {
            format!("failed to open database at {}", config.database_path.display())
        })?;
        tracing::debug!(path = %config.database_path.display(), "database opened");

        Ok(Self {
            config,
            keypair,
            db,
        })
    }

    fn validator(&self) -> Validator<'_, LedgerDb> {
        Validator::new(&self.db, &self.config.federation)
    }

    fn committed(&self, txid: &str) -> Result<Transaction> {
        self.db
            .get_transaction(txid)?
            .ok_or_else(|| anyhow!("transaction {} is not committed", txid))
    }
}

fn config_path(args: &NodeArgs) -> PathBuf {
    args.config
        .clone()
        .unwrap_or_else(|| args.data_dir.join(CONFIG_FILE_NAME))
}

fn parse_key(text: &str) -> Result<PublicKey> {
    PublicKey::from_base58(text).with_context(|| format!("invalid public key {}", text))
}

fn parse_keys(texts: &[String]) -> Result<Vec<PublicKey>> {
    texts.iter().map(|t| parse_key(t)).collect()
}

/// Pretty JSON with sorted keys; still accepted by `submit`.
fn write_transaction(tx: &Transaction, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(&serde_json::to_value(tx)?)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(txid = %tx.id, path = %path.display(), "transaction written");
        }
        None => println!("{}", text),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Initializes a data directory: node keypair, config and empty database.
fn init_node(args: cli::InitArgs) -> Result<()> {
    let data_dir = &args.node.data_dir;
    let config_path = config_path(&args.node);
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let keypair = Keypair::generate();
    let mut federation = vec![keypair.public_key()];
    for key in parse_keys(&args.federation)? {
        if !federation.contains(&key) {
            federation.push(key);
        }
    }
    let config = LedgerConfig::for_data_dir(data_dir, federation);

    std::fs::write(&config.node_key_path, keypair.secret_base58()).with_context(|| {
        format!("failed to write node key to {}", config.node_key_path.display())
    })?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&config.node_key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    config
        .save(&config_path)
        .with_context(|| format!("failed to write config {}", config_path.display()))?;
    LedgerDb::open(&config.database_path)?.flush()?;

    tracing::info!(
        public_key = %keypair.public_key(),
        federation = config.federation.len(),
        "node initialized"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Node key       : {}", config.node_key_path.display());
    println!("  Public key     : {}", keypair.public_key());
    Ok(())
}

fn keygen() {
    let keypair = Keypair::generate();
    println!("secret: {}", keypair.secret_base58());
    println!("public: {}", keypair.public_key());
}

fn create(args: cli::CreateArgs) -> Result<()> {
    let node = Node::open(&args.node)?;
    let owners = parse_keys(&args.owners)?;

    let data = match &args.data {
        Some(text) => Some(
            serde_json::from_str::<Map<String, Value>>(text)
                .context("--data must be a JSON object")?,
        ),
        None => None,
    };
    let asset = Asset::new(data).divisible(args.divisible);

    let issuer = node.keypair.public_key();
    let tx = Transaction::create(
        &[issuer],
        &[(OwnerSpec::keys(&owners), args.amount)],
        asset,
        None,
    )?
    .sign(&[node.keypair.clone()])?;

    tracing::info!(txid = %tx.id, asset = %tx.asset_id(), "CREATE built");
    write_transaction(&tx, args.output.as_deref())
}

fn transfer(args: cli::TransferArgs) -> Result<()> {
    let node = Node::open(&args.node)?;
    let prior = node.committed(&args.txid)?;

    let indices: Vec<usize> = if args.indices.is_empty() {
        (0..prior.outputs.len()).collect()
    } else {
        args.indices.clone()
    };
    let inputs = prior.to_inputs(Some(&indices))?;
    let total = indices.iter().try_fold(0u64, |acc, &i| {
        acc.checked_add(prior.outputs[i].amount)
            .ok_or_else(|| anyhow!("spent amount overflows"))
    })?;

    let keypairs = args
        .secrets
        .iter()
        .map(|s| Keypair::from_secret_base58(s.trim()).context("invalid --secret"))
        .collect::<Result<Vec<_>>>()?;
    let recipients = parse_keys(&args.recipients)?;

    let amount = args.amount.unwrap_or(total);
    if amount > total {
        bail!("cannot transfer {} out of {}", amount, total);
    }
    let mut outputs = vec![(OwnerSpec::keys(&recipients), amount)];
    if amount < total {
        let change = match &args.change_to {
            Some(text) => parse_key(text)?,
            None => keypairs[0].public_key(),
        };
        outputs.push((vec![change.into()], total - amount));
    }

    let tx = Transaction::transfer(inputs, &outputs, prior.asset_id(), None)?.sign(&keypairs)?;
    tracing::info!(txid = %tx.id, spends = %prior.id, "TRANSFER built");
    write_transaction(&tx, args.output.as_deref())
}

fn submit(args: cli::SubmitArgs) -> Result<()> {
    let node = Node::open(&args.node)?;

    let mut transactions = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let tx = Transaction::from_json(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        transactions.push(tx);
    }

    let block = Block::create(&node.keypair, transactions, node.config.federation.clone())?;
    node.validator()
        .validate_block(&block)
        .context("block rejected")?;
    node.db.commit_block(&block).context("failed to commit block")?;

    tracing::info!(
        block = %block.id,
        transactions = block.transactions().len(),
        "block committed"
    );
    println!("block {}", block.id);
    for tx in block.transactions() {
        println!("  {} {}", tx.operation, tx.id);
    }
    Ok(())
}

fn show(args: cli::ShowArgs) -> Result<()> {
    let node = Node::open(&args.node)?;
    let tx = node.committed(&args.txid)?;

    let mut spent_by = Vec::with_capacity(tx.outputs.len());
    for index in 0..tx.outputs.len() as u32 {
        let spender = node.db.get_spent(&tx.id, index)?;
        spent_by.push(spender.map(|s| s.id));
    }

    let report = json!({
        "transaction": serde_json::to_value(&tx)?,
        "spent_by": spent_by,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("ccledger-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol      {}", PROTOCOL_VERSION);
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
