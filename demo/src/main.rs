//! Notary command-line tool.
//!
//! Inspects and verifies the hash-chained audit ledger, provisions master
//! keys, and runs an end-to-end notarization scenario against a configured
//! ledger directory.
//!
//! Usage:
//!   cargo run -p demo -- gen-master-key
//!   cargo run -p demo -- --config notary.toml ledger list
//!   cargo run -p demo -- --config notary.toml ledger verify audit.log
//!   cargo run -p demo -- --config notary.toml ledger show audit.log
//!   cargo run -p demo -- scenario

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use notary_contracts::{
    actor::{Actor, Role, UserId},
    error::{NotaryError, NotaryResult},
    ledger::{AuditEntry, Outcome, VerificationResult},
    transaction::Party,
};
use notary_service::{
    open_ledger, CreateTransaction, NotaryConfig, NotaryRuntime, SignWith, StaticIdentity,
};
use notary_vault::MasterSecret;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Notary: tamper-evident audit ledger and content notarization.
#[derive(Parser)]
#[command(
    name = "notary",
    about = "Hash-chained audit ledger and content notarization",
    long_about = "Inspects and verifies the SHA-256 hash-chained audit ledger,\n\
                  provisions vault master keys, and runs a notarization scenario."
)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a fresh base64 256-bit vault master key.
    GenMasterKey,
    /// Inspect or append to the audit ledger.
    Ledger {
        #[command(subcommand)]
        command: LedgerCommand,
    },
    /// Generate a key, notarize content, verify it, revoke the key, and
    /// verify the ledger.
    Scenario,
}

#[derive(Subcommand)]
enum LedgerCommand {
    /// List the active and quarantined ledger files.
    List,
    /// Verify one ledger file. A corrupted active file is quarantined.
    Verify { file: String },
    /// Print the records of one ledger file as JSON lines.
    Show { file: String },
    /// Append one record to the active ledger.
    Record {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        user_name: String,
        #[arg(long, default_value = "CLI")]
        service: String,
        #[arg(long)]
        action: String,
        #[arg(long, default_value = "")]
        detail: String,
        /// Record the action as a failure instead of a success.
        #[arg(long)]
        failure: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_ref()) {
        Ok(config) => match cli.command {
            Command::GenMasterKey => gen_master_key(),
            Command::Ledger { command } => run_ledger(&config, command),
            Command::Scenario => run_scenario(&config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("notary error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> NotaryResult<NotaryConfig> {
    match path {
        Some(path) => NotaryConfig::from_file(path),
        None => Ok(NotaryConfig::default()),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn gen_master_key() -> NotaryResult<ExitCode> {
    let secret = MasterSecret::generate()?;
    println!("{}", secret.to_base64().as_str());
    Ok(ExitCode::SUCCESS)
}

fn run_ledger(config: &NotaryConfig, command: LedgerCommand) -> NotaryResult<ExitCode> {
    let ledger = open_ledger(&config.ledger)?;

    match command {
        LedgerCommand::List => {
            for file in ledger.list_files()? {
                let marker = if file == ledger.active_file() { "*" } else { " " };
                println!("{marker} {file}");
            }
            Ok(ExitCode::SUCCESS)
        }
        LedgerCommand::Verify { file } => match ledger.verify(&file) {
            VerificationResult::Intact => {
                println!("{file}: intact");
                Ok(ExitCode::SUCCESS)
            }
            VerificationResult::CorruptedAtLine {
                line,
                quarantined_as,
            } => {
                println!("{file}: CORRUPTED at line {line}");
                if let Some(name) = quarantined_as {
                    println!("  quarantined as {name}; a fresh ledger is now active");
                }
                Ok(ExitCode::from(2))
            }
            VerificationResult::TechnicalError { reason } => {
                eprintln!("{file}: could not be verified: {reason}");
                Ok(ExitCode::FAILURE)
            }
        },
        LedgerCommand::Show { file } => {
            for record in ledger.records(&file)? {
                let json = serde_json::to_string(&record)
                    .map_err(|e| NotaryError::storage(format!("encoding record: {e}")))?;
                println!("{json}");
            }
            Ok(ExitCode::SUCCESS)
        }
        LedgerCommand::Record {
            user_id,
            user_name,
            service,
            action,
            detail,
            failure,
        } => {
            let record = ledger.record_action(AuditEntry {
                actor: Actor::new(user_id, user_name, Role::Admin),
                service,
                action,
                detail,
                outcome: if failure {
                    Outcome::Failure
                } else {
                    Outcome::Success
                },
            })?;
            println!("appended record {} ({})", record.sequence, record.current_hash);
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

async fn run_scenario(config: &NotaryConfig) -> NotaryResult<ExitCode> {
    let master = match config.vault.master_secret() {
        Ok(master) => master,
        Err(e) => {
            warn!(error = %e, "no usable master key configured; using an ephemeral one");
            MasterSecret::generate()?
        }
    };

    let alice = UserId::new("u1");
    let bob = UserId::new("u2");
    let identity = Arc::new(StaticIdentity(Actor::new("u1", "alice", Role::User)));
    let runtime = NotaryRuntime::from_config(config, master, identity)?;

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(runtime.sweeper().run(shutdown.clone()));

    println!();
    println!("Notary end-to-end scenario");
    println!("==========================");

    let key = runtime.vault.generate(&alice, "k1", 12)?;
    println!("[1] generated key {} for {alice}", key.record.id);

    let id = runtime
        .notary
        .create_transaction(
            CreateTransaction {
                owner_id: alice.clone(),
                recipient_id: bob.clone(),
                amount: 250.0,
                validity_months: 6,
                content: b"demo video payload".to_vec(),
                content_type: "video/mp4".to_string(),
                signer: SignWith::Vault {
                    key_id: key.record.id,
                },
            },
            &shutdown,
        )
        .await?;
    println!("[2] notarized transaction {id}");

    let ok = runtime
        .notary
        .verify_transaction(id, &key.record.public_key, &shutdown)
        .await?;
    println!("[3] signature verified: {ok}");

    runtime.vault.revoke(&alice, key.record.id)?;
    let valid = runtime.vault.list_valid(&alice, Utc::now())?;
    println!("[4] key revoked; {} valid key(s) remain", valid.len());

    let history = runtime.notary.transactions_for(&bob, Party::Recipient)?;
    println!("[5] {bob} has received {} transaction(s)", history.len());

    let verdict = runtime.ledger.verify(runtime.ledger.active_file());
    println!("[6] ledger {}: {verdict:?}", runtime.ledger.active_file());

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "expiry sweeper task ended abnormally");
    }

    println!();
    Ok(if ok && verdict.is_intact() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
