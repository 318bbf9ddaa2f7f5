//! ChainWeb3 CLI: offline tooling over a contract ABI file.
//!
//! # Commands
//! ```text
//! chainweb3 signatures    --abi <path.json> [--json]
//! chainweb3 encode        --abi <path.json> --method <key> --args <json> [--bytecode <hex>]
//! chainweb3 decode-output --abi <path.json> --method <key> --output <hex>
//! chainweb3 topics        --abi <path.json> --event <key> [--filter <json>]
//! chainweb3 decode-log    --abi <path.json> --topics <...> --data <hex> [--event <key>] [--json]
//! ```

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chainweb3_abi::{
    decode_method_return, encode_constructor, encode_event_filter, encode_method, AbiModel,
    AbiValue, CONSTRUCTOR_KEY,
};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde_json::{json, Value};

mod cmd_decode_log;
mod logging;

use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "chainweb3",
    about = "Contract ABI tooling: signatures, call encoding, return and log decoding",
    long_about = "
ChainWeb3 CLI: work with a contract ABI JSON file without a node.
Methods and events are addressed by bare name, full name
(transfer(address,uint256)) or signature hash.

ENVIRONMENT VARIABLES:
  RUST_LOG    tracing filter, overrides --log-level
",
    version
)]
struct Cli {
    /// Log level: trace | debug | info | warn | error
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every function, event and constructor with its signature
    Signatures {
        /// Path to the ABI JSON file
        #[arg(long)]
        abi: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode call data for a function, or deployment data for the constructor
    Encode {
        #[arg(long)]
        abi: String,
        /// Method key, or `constructor`
        #[arg(long)]
        method: String,
        /// JSON array of arguments, e.g. '["0xabc...", "1000000"]'
        #[arg(long, default_value = "[]")]
        args: String,
        /// Contract bytecode (required for `constructor`)
        #[arg(long)]
        bytecode: Option<String>,
    },

    /// Decode `eth_call` output against a function's outputs
    #[command(name = "decode-output")]
    DecodeOutput {
        #[arg(long)]
        abi: String,
        #[arg(long)]
        method: String,
        /// Raw call result (0x-prefixed hex)
        #[arg(long)]
        output: String,
    },

    /// Build the log filter topics for an event
    Topics {
        #[arg(long)]
        abi: String,
        #[arg(long)]
        event: String,
        /// JSON object of indexed input values; arrays match any element
        #[arg(long, default_value = "{}")]
        filter: String,
    },

    /// Decode a log from raw topics and data
    #[command(name = "decode-log")]
    DecodeLog {
        #[arg(long)]
        abi: String,
        /// topics[0] = event signature, topics[1..] = indexed inputs
        #[arg(long, num_args = 1..)]
        topics: Vec<String>,
        /// Non-indexed inputs (hex, 0x-prefixed)
        #[arg(long, default_value = "0x")]
        data: String,
        /// Decode as this event instead of matching topics[0]
        #[arg(long)]
        event: Option<String>,
        /// Emitting contract address
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000")]
        address: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
        ..Default::default()
    });

    match cli.command {
        Commands::Signatures { abi, json } => cmd_signatures(&abi, json),
        Commands::Encode {
            abi,
            method,
            args,
            bytecode,
        } => cmd_encode(&abi, &method, &args, bytecode.as_deref()),
        Commands::DecodeOutput {
            abi,
            method,
            output,
        } => cmd_decode_output(&abi, &method, &output),
        Commands::Topics { abi, event, filter } => cmd_topics(&abi, &event, &filter),
        Commands::DecodeLog {
            abi,
            topics,
            data,
            event,
            address,
            json,
        } => {
            let model = load_abi(&abi)?;
            cmd_decode_log::run(Arc::new(model), topics, data, event.as_deref(), address, json)
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn load_abi(path: &str) -> Result<AbiModel> {
    let json = std::fs::read_to_string(path).with_context(|| format!("read ABI file '{path}'"))?;
    let model = AbiModel::from_json(&json).with_context(|| format!("map ABI '{path}'"))?;
    tracing::debug!(
        path,
        methods = model.methods().count(),
        events = model.events().count(),
        "ABI loaded"
    );
    Ok(model)
}

fn parse_args(args_json: &str) -> Result<Vec<AbiValue>> {
    let value: Value = serde_json::from_str(args_json).context("parse args JSON")?;
    match value {
        Value::Array(items) => Ok(items.iter().map(AbiValue::from_json).collect()),
        other => bail!("--args must be a JSON array, got {other}"),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_signatures(abi_path: &str, as_json: bool) -> Result<()> {
    let model = load_abi(abi_path)?;

    if as_json {
        let items: Vec<Value> = model
            .items()
            .iter()
            .map(|item| {
                json!({
                    "kind": item.kind,
                    "name": item.full_name,
                    "signature": item.signature,
                    "constant": item.constant,
                    "payable": item.payable,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for item in model.methods() {
        println!("{:12} {}", item.signature, item.full_name);
    }
    for item in model.events() {
        println!("{:66} {}", item.signature, item.full_name);
    }
    if model.constructor().is_some() {
        println!("{:12} {}", "", CONSTRUCTOR_KEY);
    }
    Ok(())
}

fn cmd_encode(abi_path: &str, method: &str, args_json: &str, bytecode: Option<&str>) -> Result<()> {
    let model = load_abi(abi_path)?;
    let args = parse_args(args_json)?;

    let encoded = if method == CONSTRUCTOR_KEY {
        let bytecode = bytecode.ok_or_else(|| anyhow!("--bytecode is required for the constructor"))?;
        encode_constructor(model.constructor().map(Arc::as_ref), bytecode, &args)?
    } else {
        let item = model
            .get_method(method)
            .ok_or_else(|| anyhow!("no function '{method}' in the ABI"))?;
        encode_method(item, &args)?
    };
    println!("{encoded}");
    Ok(())
}

fn cmd_decode_output(abi_path: &str, method: &str, output: &str) -> Result<()> {
    let model = load_abi(abi_path)?;
    let item = model
        .get_method(method)
        .ok_or_else(|| anyhow!("no function '{method}' in the ABI"))?;

    let decoded = decode_method_return(item, output)
        .with_context(|| format!("decode output of {}", item.full_name))?;
    let value = decoded.map(|v| v.to_json()).unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn cmd_topics(abi_path: &str, event: &str, filter_json: &str) -> Result<()> {
    let model = load_abi(abi_path)?;
    let item = model
        .get_event(event)
        .ok_or_else(|| anyhow!("no event '{event}' in the ABI"))?;

    let filter: IndexMap<String, AbiValue> = match serde_json::from_str::<Value>(filter_json)
        .context("parse filter JSON")?
    {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), AbiValue::from_json(v)))
            .collect(),
        other => bail!("--filter must be a JSON object, got {other}"),
    };

    let topics = encode_event_filter(item, &filter)?;
    println!("{}", serde_json::to_string_pretty(&topics)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_must_be_an_array() {
        let args = parse_args(r#"["0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", 42]"#).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[1], AbiValue::Uint(42));
        assert!(parse_args(r#"{"to": "0x01"}"#).is_err());
        assert!(parse_args("not json").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
