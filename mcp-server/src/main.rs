//! The `mcp-server` binary: wires the framework's independent crates
//! (`config`, `server`, `registry`, `middleware`, `response`, `resources`,
//! `protocol`, `supervisor`, `templating`) into a running process. This is
//! the only crate in the workspace that is allowed to know about all of
//! them at once.

use std::{sync::Arc, time::Duration};

use clap::Parser;
use config::Config;
use middleware::{LoggingMiddleware, MiddlewareChain, TokenCountingMiddleware, TypeVerificationMiddleware};
use protocol::{McpServer, PromptRegistry, ServerInfo};
use registry::{Dispatcher, ToolRegistry};
use resources::MemoryResourceStore;
use server::{ServeConfig, serve};
use templating::{CompiledTemplate, TemplateContext};
use tokio_util::sync::CancellationToken;
use verify_cache::{CacheConfig, VerificationCache};

const SERVER_NAME: &str = "mcp-server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const INSTRUCTIONS_TEMPLATE: &str = "\
{{server.name}} v{{server.version}} exposes the following tools:
{{#each tools}}
- {{this}}
{{/each}}
Call a tool with `response_mode: \"summary\"` unless you need the full payload.";

/// An MCP (Model Context Protocol) server: tools, resources, and prompts
/// over a pipe, HTTP, or WebSocket transport.
#[derive(Parser, Debug)]
#[command(name = "mcp-server", version, about)]
struct Cli {
    /// Path to the TOML configuration file. Falls back to built-in
    /// defaults (pipe transport, no auth) when the file does not exist.
    #[arg(long, env = "MCP_SERVER_CONFIG", default_value = "mcp-server.toml")]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    server::logger::init(&config.logging.level);

    configure_response_defaults(&config);
    let verification_cache = build_verification_cache(&config);

    let chain = MiddlewareChain::new(vec![
        Arc::new(LoggingMiddleware::default()),
        Arc::new(TypeVerificationMiddleware::new(middleware::GateMode::Disabled, verification_cache)),
        Arc::new(TokenCountingMiddleware::default()),
    ]);

    let registry = ToolRegistry::new(chain);
    registry.register(Arc::new(echo_tool::EchoTool))?;
    registry.freeze();

    let tool_names = registry.names();
    log::info!(
        "{SERVER_NAME} v{SERVER_VERSION} starting, transport={:?}, {} tool(s) registered",
        config.server.transport,
        tool_names.len()
    );
    let dispatcher = Arc::new(Dispatcher::new(registry));

    let resources = MemoryResourceStore::new();
    let prompts = Arc::new(PromptRegistry::new());

    let info = ServerInfo::new(SERVER_NAME, SERVER_VERSION);
    let instructions = render_instructions(&tool_names);
    let mcp = Arc::new(McpServer::new(info, dispatcher, resources, prompts).with_instructions(instructions));

    let shutdown_signal = CancellationToken::new();
    tokio::spawn(wait_for_ctrl_c(shutdown_signal.clone()));

    let supervisor = supervisor::ServiceSupervisor::new(config.supervisor.clone());
    if let Some(supervisor) = supervisor.clone() {
        supervisor.ensure_running().await?;
        tokio::spawn(supervisor.run_health_loop(shutdown_signal.clone()));
    }

    let result = serve(ServeConfig { mcp, config, shutdown_signal, bound_addr_sender: None }).await;

    if let Some(supervisor) = supervisor {
        supervisor.stop().await;
    }

    result
}

/// Loads configuration from `path`, falling back to in-process defaults
/// when the file is absent so a first run needs no TOML file at all.
fn load_config(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        log::warn!("no config file at {}, using defaults (pipe transport, no auth)", path.display());
        Ok(Config::default())
    }
}

/// Threads `[tokens]` into `response`'s otherwise-hardcoded budgets and
/// safety buffer, once, at startup.
fn configure_response_defaults(config: &Config) {
    response::configure_default_budgets(config.tokens.summary_budget, config.tokens.full_budget);

    let safety = match config.tokens.safety_percent {
        Some(config::SafetyPercentConfig { percent, min_buf, max_buf }) => {
            response::DefaultSafety::Percent { percent, min_buf, max_buf }
        }
        None => response::DefaultSafety::Mode(match config.tokens.safety_mode {
            config::SafetyMode::Default => tokenizer::SafetyMode::Default,
            config::SafetyMode::Conservative => tokenizer::SafetyMode::Conservative,
            config::SafetyMode::Minimal => tokenizer::SafetyMode::Minimal,
        }),
    };
    response::configure_default_safety(safety);
}

fn build_verification_cache(config: &Config) -> Arc<VerificationCache> {
    let verification_cache = &config.verification_cache;
    VerificationCache::new(CacheConfig {
        expiry: Duration::from_secs_f64(verification_cache.expiry_hours * 3600.0),
        max_count: verification_cache.max_count,
        max_bytes: verification_cache.max_bytes,
        eviction_strategy: match verification_cache.eviction_strategy {
            config::EvictionStrategy::Lru => verify_cache::EvictionStrategy::Lru,
            config::EvictionStrategy::Lfu => verify_cache::EvictionStrategy::Lfu,
            config::EvictionStrategy::Fifo => verify_cache::EvictionStrategy::Fifo,
            config::EvictionStrategy::Random => verify_cache::EvictionStrategy::Random,
        },
        eviction_percent: verification_cache.eviction_percent,
        watch_files: verification_cache.watch_files,
    })
}

fn render_instructions(tool_names: &[String]) -> String {
    let ctx = TemplateContext::new(SERVER_NAME, SERVER_VERSION).with_tools(tool_names.iter().cloned());

    match CompiledTemplate::compile(INSTRUCTIONS_TEMPLATE) {
        Ok(template) => template.render(&ctx),
        Err(error) => {
            log::error!("built-in instructions template failed to compile: {error}");
            format!("{SERVER_NAME} v{SERVER_VERSION}")
        }
    }
}

async fn wait_for_ctrl_c(shutdown_signal: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::info!("received ctrl-c, shutting down");
    }
    shutdown_signal.cancel();
}
