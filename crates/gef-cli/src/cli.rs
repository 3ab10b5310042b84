//! Thin command-line wrapper around `gef-core`/`gef-crypto` (spec §6.4).
//!
//! This crate adds no protocol semantics: every subcommand is a direct call
//! into [`gef_core::LedgerHandle::append`] or [`gef_core::ReplayEngine::verify_ledger`],
//! with `anyhow::Context` used only for CLI-facing error messages.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gef_core::replay::ViolationKind;
use gef_core::{Envelope, LedgerHandle, RecordType, ReplayEngine};
use gef_crypto::SecretSeed;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gef")]
#[command(about = "GuardClaw Execution Framework: append-only evidence ledger (reference CLI)")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh Ed25519 keypair
    Keygen {
        /// Write the base64url secret key here instead of stdout
        #[arg(long)]
        out_sk: Option<PathBuf>,
        /// Write the base64url public key here instead of stdout
        #[arg(long)]
        out_pk: Option<PathBuf>,
    },
    /// Append one envelope to a ledger
    Append {
        /// Ledger file (.jsonl), created if missing
        #[arg(long)]
        ledger: PathBuf,
        /// agent_id for every envelope written through this handle
        #[arg(long)]
        agent_id: String,
        /// File containing the base64url Ed25519 secret key
        #[arg(long)]
        sk: PathBuf,
        /// One of: execution, intent, result, failure
        #[arg(long)]
        record_type: String,
        /// File containing the payload as a JSON object
        #[arg(long)]
        payload: PathBuf,
    },
    /// Print summary information about a ledger
    Info {
        /// Ledger file (.jsonl)
        path: PathBuf,
    },
    /// Verify a ledger's schema, chain, and signatures
    Verify {
        /// Ledger file (.jsonl)
        path: PathBuf,
        /// Require every envelope's signer_public_key to equal this hex key
        #[arg(long)]
        public_key: Option<String>,
        /// Print the ReplaySummary as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

/// Parses arguments and dispatches to the matching subcommand.
///
/// # Errors
///
/// Propagates argument-parsing failures and any I/O, schema, or
/// version-fatal error surfaced by `gef-core`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Keygen { out_sk, out_pk } => cmd_keygen(out_sk, out_pk).map(|()| ExitCode::SUCCESS),
        Command::Append { ledger, agent_id, sk, record_type, payload } => {
            cmd_append(ledger, agent_id, sk, record_type, payload).map(|()| ExitCode::SUCCESS)
        }
        Command::Info { path } => cmd_info(path).map(|()| ExitCode::SUCCESS),
        Command::Verify { path, public_key, json } => cmd_verify(path, public_key, json),
    }
}

fn cmd_keygen(out_sk: Option<PathBuf>, out_pk: Option<PathBuf>) -> Result<()> {
    let kp = gef_crypto::generate_keypair();
    let sk_b64 = gef_crypto::b64url_encode(&kp.secret.0);
    let pk_hex = gef_crypto::hex_encode(&kp.public);
    match (out_sk, out_pk) {
        (Some(sk_path), Some(pk_path)) => {
            fs::write(&sk_path, &sk_b64).with_context(|| format!("write {}", sk_path.display()))?;
            fs::write(&pk_path, &pk_hex).with_context(|| format!("write {}", pk_path.display()))?;
            println!("wrote secret key -> {}, public key -> {}", sk_path.display(), pk_path.display());
        }
        (None, None) => {
            println!("secret_key(b64url)={sk_b64}");
            println!("public_key(hex)={pk_hex}");
        }
        _ => anyhow::bail!("--out-sk and --out-pk must be supplied together"),
    }
    Ok(())
}

fn load_secret_key(path: &PathBuf) -> Result<SecretSeed> {
    let raw = fs::read_to_string(path).with_context(|| format!("read secret key {}", path.display()))?;
    let bytes = gef_crypto::b64url_decode(raw.trim()).context("secret key is not valid base64url")?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow::anyhow!("secret key must decode to 32 bytes, got {}", v.len()))?;
    Ok(SecretSeed(array))
}

fn cmd_append(
    ledger: PathBuf,
    agent_id: String,
    sk_path: PathBuf,
    record_type: String,
    payload_path: PathBuf,
) -> Result<()> {
    let record_type = RecordType::parse(&record_type)
        .ok_or_else(|| anyhow::anyhow!("{record_type:?} is not execution, intent, result, or failure"))?;
    let secret_key = load_secret_key(&sk_path)?;
    let payload_raw =
        fs::read_to_string(&payload_path).with_context(|| format!("read payload {}", payload_path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&payload_raw).context("payload is not valid JSON")?;

    let mut handle = LedgerHandle::open(&ledger, secret_key, agent_id).context("open ledger")?;
    let envelope = handle.append(record_type, payload).context("append envelope")?;
    handle.sync().context("sync ledger")?;

    println!("appended sequence={} record_id={}", envelope.unsigned.sequence, envelope.unsigned.record_id);
    Ok(())
}

fn cmd_info(path: PathBuf) -> Result<()> {
    let content = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let mut count: u64 = 0;
    let mut last: Option<Envelope> = None;
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let envelope: Envelope =
            serde_json::from_str(line).with_context(|| format!("parse line {i} of {}", path.display()))?;
        count += 1;
        last = Some(envelope);
    }

    println!("file          : {}", path.display());
    println!("entries       : {count}");
    if let Some(envelope) = last {
        println!("last_sequence : {}", envelope.unsigned.sequence);
        println!("last_causal   : {}", envelope.unsigned.causal_hash);
        println!("agent_id      : {}", envelope.unsigned.agent_id);
        println!("signer_key    : {}", envelope.unsigned.signer_public_key);
    }
    Ok(())
}

fn cmd_verify(path: PathBuf, public_key: Option<String>, json: bool) -> Result<ExitCode> {
    let summary = ReplayEngine::verify_ledger(&path, public_key.as_deref())?;

    if json {
        println!("{}", summary_to_json(&summary));
    } else {
        println!("total_entries    : {}", summary.total_entries);
        println!("schema_valid     : {}", summary.schema_valid);
        println!("chain_valid      : {}", summary.chain_valid);
        println!("signatures_valid : {}", summary.signatures_valid);
        println!("overall_valid    : {}", summary.overall_valid);
        for v in &summary.violations {
            println!("  violation: kind={} at_sequence={} detail={}", violation_kind_str(v.kind), v.at_sequence, v.detail);
        }
        for w in &summary.warnings {
            println!("  warning: {w}");
        }
    }

    Ok(if summary.overall_valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn violation_kind_str(kind: ViolationKind) -> &'static str {
    match kind {
        ViolationKind::Schema => "schema",
        ViolationKind::SequenceGap => "sequence_gap",
        ViolationKind::ChainBreak => "chain_break",
        ViolationKind::InvalidSignature => "invalid_signature",
    }
}

fn summary_to_json(summary: &gef_core::ReplaySummary) -> serde_json::Value {
    serde_json::json!({
        "total_entries": summary.total_entries,
        "schema_valid": summary.schema_valid,
        "chain_valid": summary.chain_valid,
        "signatures_valid": summary.signatures_valid,
        "overall_valid": summary.overall_valid,
        "violations": summary.violations.iter().map(|v| serde_json::json!({
            "kind": violation_kind_str(v.kind),
            "at_sequence": v.at_sequence,
            "detail": v.detail,
        })).collect::<Vec<_>>(),
        "warnings": summary.warnings,
    })
}
