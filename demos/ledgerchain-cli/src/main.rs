//! ledgerchain-cli — operator CLI for the embedded supply-chain ledger.
//!
//! Each invocation opens (or creates) the SQLite database at `--db`,
//! performs one action, and closes it again — there is no long-running
//! process here, just `LedgerHandle::new` wired to `clap::Subcommand`.
//!
//! Usage:
//!   ledgerchain-cli init     [--db <url>]
//!   ledgerchain-cli keygen   --actor <id> [--db <url>]
//!   ledgerchain-cli validator --actor <id> [--db <url>]
//!   ledgerchain-cli submit   --actor <id> --role <role> --batch <no> --type <TAG> --data <json> [--from <id>] [--to <id>] [--db <url>]
//!   ledgerchain-cli seal     [--validator <id>] [--db <url>]
//!   ledgerchain-cli history  --batch <no> [--db <url>]
//!   ledgerchain-cli validate [--db <url>]
//!   ledgerchain-cli stats    [--db <url>]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use ledgerchain::{LedgerConfig, LedgerHandle, TransactionRequest};
use ledgerchain_core::TransactionType;

#[derive(Parser, Debug)]
#[command(
    name = "ledgerchain-cli",
    version,
    about = "Operator CLI for the ledgerchain supply-chain ledger"
)]
struct Args {
    /// sqlx sqlite connection string for the ledger's database.
    #[arg(long, global = true, default_value = "sqlite://ledgerchain.db")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open (creating if necessary) the database and print its stats.
    Init,

    /// Generate a signing keypair for an actor.
    Keygen {
        #[arg(long)]
        actor: i64,
    },

    /// Register an actor as an allowed block validator.
    Validator {
        #[arg(long)]
        actor: i64,
    },

    /// Record one supply-chain event.
    Submit {
        /// Actor submitting the event — must already have a key via `keygen`.
        #[arg(long)]
        actor: i64,
        #[arg(long)]
        role: String,
        #[arg(long)]
        batch: String,
        /// Transaction type tag, e.g. BATCH_CREATE, HARVEST_RECORD.
        #[arg(long = "type")]
        type_tag: String,
        /// Event payload as a JSON object.
        #[arg(long, default_value = "{}")]
        data: String,
        #[arg(long)]
        from: Option<i64>,
        #[arg(long)]
        to: Option<i64>,
    },

    /// Force-seal the pending pool into a new block.
    Seal {
        /// Sign the block as this validator (must be registered via `validator`).
        #[arg(long)]
        validator: Option<i64>,
    },

    /// Print the provenance trail for a batch.
    History {
        #[arg(long)]
        batch: String,
    },

    /// Run the chain's full integrity check.
    Validate,

    /// Print chain-wide statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,ledgerchain=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut config = LedgerConfig::default();
    config.database_url = args.db;
    let ledger = LedgerHandle::new(config).await.context("opening ledger database")?;

    match args.command {
        Command::Init => {
            let stats = ledger.get_stats().await;
            println!("ledger ready: {} block(s), difficulty {}", stats.block_count, stats.current_difficulty);
        }

        Command::Keygen { actor } => {
            let issued = ledger.generate_key(actor).await.context("generating key")?;
            info!(actor, key_version = issued.record.key_version, "key generated");
            println!("actor {actor} public key: {}", issued.record.public_key);
            println!(
                "actor {actor} private key (save this — it is shown only once): {}",
                issued.private_key_hex.as_str()
            );
        }

        Command::Validator { actor } => {
            ledger.add_validator(actor).await.context("registering validator")?;
            println!("actor {actor} may now seal blocks as a validator");
        }

        Command::Submit { actor, role, batch, type_tag, data, from, to } => {
            let transaction_type = TransactionType::from_tag(&type_tag.to_uppercase())
                .ok_or_else(|| anyhow::anyhow!("unknown transaction type {type_tag:?}"))?;
            let transaction_data = match serde_json::from_str(&data).context("parsing --data as JSON")? {
                serde_json::Value::Object(m) => m,
                _ => bail!("--data must be a JSON object"),
            };
            let outcome = ledger
                .submit_transaction(TransactionRequest {
                    transaction_type,
                    batch_no: batch,
                    actor_user_id: actor,
                    actor_role: role,
                    transaction_data,
                    from_entity_id: from,
                    to_entity_id: to,
                    document_hashes: None,
                })
                .await
                .context("submitting transaction")?;
            println!("recorded transaction {}", outcome.transaction.hash);
            match outcome.block {
                Some(block) => println!("pool reached block_size — auto-sealed block {}", block.block_number),
                None => println!("{} transaction(s) now pending", outcome.pending),
            }
        }

        Command::Seal { validator } => match ledger.seal(validator).await.context("sealing block")? {
            Some(block) => println!("sealed block {} ({} transactions, difficulty {})", block.block_number, block.transactions.len(), block.difficulty),
            None => println!("nothing pending to seal"),
        },

        Command::History { batch } => {
            let history = ledger.get_batch_history(&batch).await;
            if history.is_empty() {
                println!("no sealed history for batch {batch}");
            }
            for entry in history {
                println!(
                    "block {} | {:?} | actor {} | {}",
                    entry.block_number, entry.stage, entry.transaction.actor_user_id, entry.transaction.hash
                );
            }
        }

        Command::Validate => {
            let valid = ledger.validate_chain().await;
            println!("chain valid: {valid}");
        }

        Command::Stats => {
            let stats = ledger.get_stats().await;
            println!("blocks:             {}", stats.block_count);
            println!("pending:            {}", stats.pending_count);
            println!("difficulty:         {}", stats.current_difficulty);
            println!("total transactions: {}", stats.total_transactions);
            println!("validators:         {}", stats.validator_count);
        }
    }

    ledger.shutdown().await;
    Ok(())
}
