mod fixture;
mod report;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use sct_core::module::{Decompiler, ModuleDecompiler, ModuleDefinition, MODULE_MAGIC};
use sct_core::validation::{DeterminismValidator, FormatValidator, ModuleValidator};
use sct_core::{
    Address, BlockExecutor, BlockOutcome, ErrorKind, ExecutionCarrier, ExecutorConfig, Hash256, TransactionDispatcher,
    Value,
};

use crate::fixture::BlockFixture;
use crate::report::{render, report_structure, ValidationReportData};

/// SCT: smart contract transaction tools
///
/// Validate contract modules, derive contract addresses, and execute
/// block fixtures against an in-memory ledger.
#[derive(Parser)]
#[command(name = "sct", version, about, long_about = None)]
struct Cli {
    /// Suppress human-readable output; exit code only
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate contract modules for format and determinism
    Validate {
        /// Module files: encoded `SCTM` bytes or a JSON module definition
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Show the encoded module bytes
        #[arg(long = "showbytes", short = 'b')]
        show_bytes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Derive the address a create transaction deploys to
    Address {
        /// Sender address (hex)
        #[arg(long)]
        sender: Address,
        /// Hash of the creating transaction (hex)
        #[arg(long)]
        tx: Hash256,
        /// Index of the contract output
        #[arg(long, default_value_t = 0)]
        nvout: u32,
    },

    /// Execute a block fixture against an in-memory ledger
    Run {
        /// Path to block fixture (.json)
        file: PathBuf,
        /// Executor configuration (.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let exit_code = match cli.command {
        Commands::Validate { files, show_bytes, json } => cmd_validate(&files, show_bytes, json, cli.quiet),
        Commands::Address { sender, tx, nvout } => {
            let carrier = ExecutionCarrier::create(sender, Vec::new(), 1, 0, tx, nvout);
            println!("{}", carrier.new_contract_address());
            0
        }
        Commands::Run { file, config, json } => cmd_run(&file, config.as_deref(), json, cli.quiet),
        Commands::Version => {
            println!("sct {} (sct-core {})", env!("CARGO_PKG_VERSION"), sct_core::VERSION);
            0
        }
    };

    process::exit(exit_code);
}

// ── Validate ──────────────────────────────────────────────

/// Turn a module file into encoded module bytes
fn compile(bytes: &[u8]) -> Result<Vec<u8>, String> {
    if bytes.starts_with(MODULE_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let module: ModuleDefinition =
        serde_json::from_slice(bytes).map_err(|e| format!("not a module definition: {}", e))?;
    module.to_bytes().map_err(|e| e.to_string())
}

fn validate_file(path: &Path, show_bytes: bool) -> Result<ValidationReportData, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let mut data = ValidationReportData::new(path.display().to_string());

    let code = match compile(&bytes) {
        Ok(code) => code,
        Err(message) => {
            data.decode_errors.push(message);
            return Ok(data);
        }
    };
    let decompilation = match ModuleDecompiler::default().module_definition(&code) {
        Ok(decompilation) => decompilation,
        Err(err) => {
            data.decode_errors.push(err.to_string());
            return Ok(data);
        }
    };
    data.decoded = true;
    data.format_errors = FormatValidator.validate(&decompilation).errors;
    data.determinism_errors = DeterminismValidator.validate(&decompilation).errors;
    if show_bytes {
        data.bytes = Some(code);
    }
    Ok(data)
}

fn cmd_validate(files: &[PathBuf], show_bytes: bool, json: bool, quiet: bool) -> i32 {
    let mut reports = Vec::new();
    let mut io_failed = false;
    for path in files {
        match validate_file(path, show_bytes) {
            Ok(data) => reports.push(data),
            Err(message) => {
                eprintln!("{} {}", "error:".red().bold(), message);
                io_failed = true;
            }
        }
    }

    let all_valid = reports.iter().all(ValidationReportData::is_valid);
    if json {
        let output = serde_json::json!({
            "valid": all_valid && !io_failed,
            "errors": reports.iter().map(ValidationReportData::error_count).sum::<usize>(),
            "files": reports,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    } else {
        let sections = report_structure(show_bytes);
        for data in &reports {
            if !quiet {
                print!("{}", render(&sections, data));
            }
            if !data.is_valid() {
                eprintln!("{} {}: {} error(s)", "error:".red().bold(), data.file, data.error_count());
            }
        }
    }

    if io_failed {
        2
    } else if all_valid {
        0
    } else {
        1
    }
}

// ── Run ───────────────────────────────────────────────────

fn receipt_json(outcome: &BlockOutcome) -> Vec<serde_json::Value> {
    outcome
        .receipts
        .iter()
        .map(|receipt| match &receipt.outcome {
            Ok(result) => serde_json::json!({
                "index": receipt.index,
                "status": status_label(result.error_kind()),
                "result": result,
            }),
            Err(err) => serde_json::json!({
                "index": receipt.index,
                "status": "error",
                "kind": err.kind(),
                "error": err.to_string(),
            }),
        })
        .collect()
}

fn status_label(kind: Option<ErrorKind>) -> &'static str {
    match kind {
        None => "success",
        Some(ErrorKind::InvalidContractRejected) => "rejected",
        Some(_) => "reverted",
    }
}

fn cmd_run(file: &Path, config: Option<&Path>, json: bool, quiet: bool) -> i32 {
    let config = match config.map(ExecutorConfig::from_path).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            return 2;
        }
    };
    tracing::debug!(file = %file.display(), "loading block fixture");
    let parts = BlockFixture::from_path(file).and_then(BlockFixture::into_parts);
    let (mut store, block, carriers) = match parts {
        Ok(parts) => parts,
        Err(message) => {
            eprintln!("{} {}", "error:".red().bold(), message);
            return 2;
        }
    };

    let dispatcher = TransactionDispatcher::new(config);
    let outcome = BlockExecutor::new(&dispatcher).execute_block(&mut store, &block, &carriers);

    let mut condensing = Vec::new();
    for tx in outcome.condensing_transactions() {
        match tx.id() {
            Ok(id) => condensing.push((id, tx)),
            Err(err) => {
                eprintln!("{} {}", "error:".red().bold(), err);
                return 2;
            }
        }
    }

    if json {
        let output = serde_json::json!({
            "block": block.number,
            "receipts": receipt_json(&outcome),
            "total_gas": outcome.total_gas(),
            "condensing_transactions": condensing
                .iter()
                .map(|(id, tx)| serde_json::json!({ "id": id, "transaction": tx }))
                .collect::<Vec<_>>(),
            "state": store,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    } else if !quiet {
        println!("Block #{}: {} transaction(s)", block.number, outcome.receipts.len());
        for (receipt, carrier) in outcome.receipts.iter().zip(&carriers) {
            let op = if carrier.is_create() { "create" } else { "call" };
            match &receipt.outcome {
                Ok(result) if !result.revert => {
                    let mut line = format!("  [{}] {:<6} {} gas {}", receipt.index, op, "success".green(), result.gas_consumed);
                    if let Some(address) = result.new_contract_address {
                        line.push_str(&format!(" contract {}", address));
                    }
                    if result.return_value != Value::Null {
                        line.push_str(&format!(" returned {}", result.return_value));
                    }
                    println!("{}", line);
                }
                Ok(result) => println!(
                    "  [{}] {:<6} {} gas {}: {}",
                    receipt.index,
                    op,
                    status_label(result.error_kind()).yellow(),
                    result.gas_consumed,
                    result.exception.as_deref().unwrap_or("")
                ),
                Err(err) => println!("  [{}] {:<6} {} {}", receipt.index, op, "error".red().bold(), err),
            }
        }
        for (id, tx) in &condensing {
            println!("Condensing {} ({} in, {} out)", id, tx.inputs.len(), tx.outputs.len());
            for output in &tx.outputs {
                println!("  -> {} {}", output.address, output.value);
            }
        }
        println!("Total gas: {}", outcome.total_gas());
    }

    if outcome.receipts.iter().any(|r| r.outcome.is_err()) {
        1
    } else {
        0
    }
}
