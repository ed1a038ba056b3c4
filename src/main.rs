//! `ptc-host` binary.
//!
//! Wires a small built-in example catalog to the orchestrator and executes
//! one agent program read from `--file` or stdin, for manual smoke-testing
//! and as the integration test harness's entry point.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ptc_host::sandbox::local::{LocalProcessProvider, Runner};
use ptc_host::sandbox::SandboxProvider;
use ptc_host::schema::{ObjectField, Schema};
use ptc_host::tool::{Tool, ToolSpec};
use ptc_host::{Client, ClientConfig, ExecutionResult};

#[derive(Parser, Debug)]
#[command(name = "ptc-host", version, about = "Programmatic Tool Calling sandbox orchestrator")]
struct Cli {
    /// Agent source file to execute. Reads stdin when omitted.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Override the maximum number of tool-call sentinels a single
    /// execution may emit.
    #[arg(long)]
    max_recursion: Option<u32>,

    /// Override the host-side wall-clock deadline, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the catalog text used for prompt injection and exit.
    #[arg(long)]
    catalog: bool,

    /// Path to the runner command used to execute assembled sandbox
    /// programs, e.g. `deno` or `node`. Defaults to `deno`.
    #[arg(long, default_value = "deno")]
    runner: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    run(Cli::parse()).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(limit) = cli.max_recursion {
        config.max_recursion_limit = limit;
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout_ms = ms;
    }

    let runner = Runner::new(cli.runner, vec!["{main}".to_string()], config.language.ext());
    let provider: Arc<dyn SandboxProvider> = Arc::new(LocalProcessProvider::new(runner));

    let client = Client::new(config, example_tools(), provider)?;

    if cli.catalog {
        print!("{}", client.catalog_text());
        return Ok(());
    }

    let code = match cli.file {
        Some(path) => std::fs::read_to_string(&path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let result = client.execute(code).await;
    let exit_code = if result.is_success() { 0 } else { 1 };
    println!("{}", serde_json::to_string_pretty(&result)?);
    std::process::exit(exit_code);
}

/// A small built-in catalog (`get_weather`, `calculate`, `echo`) so the
/// binary is runnable standalone for manual verification.
fn example_tools() -> Vec<ToolSpec> {
    vec![ToolSpec::bare(GetWeatherTool), ToolSpec::bare(CalculateTool), ToolSpec::bare(EchoTool)]
}

struct GetWeatherTool;

#[async_trait::async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }
    fn description(&self) -> &str {
        "Get the current weather for a city"
    }
    fn input_schema(&self) -> &Schema {
        static SCHEMA: std::sync::OnceLock<Schema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| Schema::Object { fields: vec![ObjectField::new("city", Schema::String)] })
    }
    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, String> {
        let city = args.get("city").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
        Ok(serde_json::json!({"weather": "sunny", "city": city}))
    }
}

struct CalculateTool;

#[async_trait::async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }
    fn description(&self) -> &str {
        "Perform a basic arithmetic operation on two numbers"
    }
    fn input_schema(&self) -> &Schema {
        static SCHEMA: std::sync::OnceLock<Schema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| Schema::Object {
            fields: vec![
                ObjectField::new("a", Schema::Number),
                ObjectField::new("b", Schema::Number),
                ObjectField::new("operation", Schema::Enum(vec!["add".into(), "sub".into(), "mul".into(), "div".into()])),
            ],
        })
    }
    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, String> {
        let a = args.get("a").and_then(|v| v.as_f64()).ok_or("missing \"a\"")?;
        let b = args.get("b").and_then(|v| v.as_f64()).ok_or("missing \"b\"")?;
        let result = match args.get("operation").and_then(|v| v.as_str()) {
            Some("add") => a + b,
            Some("sub") => a - b,
            Some("mul") => a * b,
            Some("div") if b != 0.0 => a / b,
            Some("div") => return Err("division by zero".to_string()),
            other => return Err(format!("unsupported operation: {other:?}")),
        };
        Ok(serde_json::json!({"result": result}))
    }
}

struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Return the given value unchanged, useful for pipeline smoke tests"
    }
    fn input_schema(&self) -> &Schema {
        static SCHEMA: std::sync::OnceLock<Schema> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| Schema::Any)
    }
    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, String> {
        Ok(args)
    }
}
