// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP Chatbot entry point - CLI, startup, REPL and shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use mcp_chatbot::agent::{Agent, AgentCallbacks, AgentConfig, AgentOptions, TurnOutcome};
use mcp_chatbot::config::{self, CliOptions, ResolvedConfig};
use mcp_chatbot::mcp::{
    connect_all, discover_all, LifecycleManager, McpConfig, Router, StdioConnector,
};
use mcp_chatbot::providers::create_provider_from_config;
use mcp_chatbot::repl::{render_server_summary, terminal_callbacks, Activity, Exit, Repl};
use mcp_chatbot::telemetry::{init_telemetry, TelemetryConfig};
use mcp_chatbot::types::SharedProvider;
use mcp_chatbot::VERSION;

/// MCP Chatbot - chat with Claude over the tools of many MCP servers.
#[derive(Parser)]
#[command(name = "mcp-chatbot")]
#[command(author, version, about = "Chat with Claude over the tools of many MCP servers", long_about = None)]
struct Cli {
    /// Path to the server config (JSON or YAML with an `mcpServers` map)
    #[arg(short, long, env = "MCP_CHATBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Model to use
    #[arg(short, long, env = "MCP_CHATBOT_MODEL")]
    model: Option<String>,

    /// Maximum tokens per model response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Maximum model calls per query
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Base URL for the Anthropic API
    #[arg(long, env = "ANTHROPIC_BASE_URL")]
    base_url: Option<String>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Scheme that `@folders` and `@<topic>` expand into
    #[arg(long)]
    resource_scheme: Option<String>,

    /// Run a single query and exit
    #[arg(short = 'P', long)]
    prompt: Option<String>,

    /// Output format for non-interactive mode
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    output_format: OutputFormat,

    /// Show verbose output (debug logs, tool results, turn stats)
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn options(&self) -> CliOptions {
        CliOptions {
            config: self.config.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            max_iterations: self.max_iterations,
            resource_scheme: self.resource_scheme.clone(),
            verbose: self.verbose,
        }
    }
}

/// Output format for non-interactive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Subcommands for mcp-chatbot.
#[derive(Subcommand)]
enum Commands {
    /// List the configured servers without starting them
    Servers {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_telemetry(&TelemetryConfig::for_verbosity(cli.verbose)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let working_dir = std::env::current_dir()?;

    match cli.command {
        Some(Commands::Version) => {
            println!("mcp-chatbot {}", VERSION);
            return Ok(());
        }
        Some(Commands::Servers { json }) => {
            return handle_servers(&working_dir, cli.options(), json);
        }
        None => {}
    }

    let resolved = config::load_config(&working_dir, cli.options()).map_err(|e| {
        tracing::error!(error = %e, "Server config unavailable");
        e
    })?;
    let servers = load_servers(&resolved)?;

    let provider: SharedProvider = Arc::from(
        create_provider_from_config(&resolved).context("Failed to create model provider")?,
    );

    let lifecycle = LifecycleManager::new();
    let result = run_session(
        &resolved,
        &servers,
        provider,
        &lifecycle,
        cli.prompt.as_deref(),
        cli.output_format,
    )
    .await;

    // Every exit path after the first spawn comes through here.
    let shutdown = lifecycle.shutdown().await;
    if let Err(ref e) = shutdown {
        eprintln!("{}", format!("Shutdown error: {}", e).red());
    }

    result?;
    shutdown?;
    Ok(())
}

fn load_servers(resolved: &ResolvedConfig) -> anyhow::Result<McpConfig> {
    let path = resolved
        .server_config
        .as_deref()
        .context("No server config located")?;
    config::load_server_config(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Server config unreadable");
        anyhow::Error::new(e).context(format!("Cannot read server config {}", path.display()))
    })
}

fn handle_servers(working_dir: &Path, options: CliOptions, json: bool) -> anyhow::Result<()> {
    let resolved = config::load_config(working_dir, options)?;
    let servers = load_servers(&resolved)?;

    if json {
        let list: Vec<_> = servers
            .servers
            .iter()
            .map(|(name, server)| {
                serde_json::json!({
                    "name": name,
                    "command": server.command,
                    "args": server.args,
                    "enabled": server.enabled,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if let Some(path) = &resolved.server_config {
        println!("{}", format!("Servers in {}", path.display()).bright_blue().bold());
    }
    for (name, server) in &servers.servers {
        let marker = if server.enabled { "✓".green() } else { "✗".red() };
        println!(
            "{} {} - {} {}",
            marker,
            name.bright_white(),
            server.command,
            server.args.join(" ")
        );
    }
    Ok(())
}

/// Start servers, discover, then chat. Returns early on Ctrl-C.
async fn run_session(
    resolved: &ResolvedConfig,
    servers: &McpConfig,
    provider: SharedProvider,
    lifecycle: &LifecycleManager,
    one_shot: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let activity = Arc::new(Activity::new());
    let enabled = servers.enabled_servers().count();
    activity.start(format!("Connecting to {} MCP servers...", enabled));

    let outcome = tokio::select! {
        outcome = connect_all(servers, &StdioConnector, lifecycle) => outcome,
        _ = tokio::signal::ctrl_c() => {
            activity.stop();
            println!("{}", "Interrupted during startup.".yellow());
            return Ok(());
        }
    };

    activity.set_message("Discovering capabilities...");
    let (catalog, discovery_failures) = tokio::select! {
        result = discover_all(&outcome.clients) => result,
        _ = tokio::signal::ctrl_c() => {
            activity.stop();
            println!("{}", "Interrupted during startup.".yellow());
            return Ok(());
        }
    };
    activity.stop();

    for failure in &outcome.failures {
        eprintln!("{}", failure.to_string().red());
    }
    for failure in &discovery_failures {
        eprintln!("{}", format!("{}: {}", failure.server, failure.error).red());
    }
    for client in &outcome.clients {
        if discovery_failures.iter().any(|f| f.server == client.name()) {
            continue;
        }
        println!("{}", render_server_summary(client.name(), &catalog));
    }
    println!(
        "{}",
        format!(
            "Connected to {} of {} servers ({} tools, {} prompts, {} resources)",
            outcome.clients.len(),
            enabled,
            catalog.tools.len(),
            catalog.prompts.len(),
            catalog.resources.len()
        )
        .dimmed()
    );

    let callbacks = match (one_shot, format) {
        (Some(_), OutputFormat::Json) => AgentCallbacks::default(),
        _ => terminal_callbacks(activity.clone(), resolved.verbose),
    };
    let agent = Agent::new(AgentOptions {
        provider,
        router: Router::new(Arc::new(catalog)),
        config: AgentConfig::from(resolved),
        callbacks,
    });

    if let Some(query) = one_shot {
        return run_one_shot(&agent, &activity, query, format).await;
    }

    let repl = Repl::new(agent, activity, &resolved.resource_scheme);
    match repl.run().await? {
        Exit::Quit => println!("Goodbye!"),
        Exit::Interrupted => println!("{}", "Interrupted, shutting down.".yellow()),
    }
    Ok(())
}

async fn run_one_shot(
    agent: &Agent,
    activity: &Activity,
    query: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Text {
        activity.start("Thinking...");
    }
    let result = tokio::select! {
        result = agent.chat(query) => result,
        _ = tokio::signal::ctrl_c() => {
            activity.stop();
            println!("{}", "Interrupted.".yellow());
            return Ok(());
        }
    };
    activity.stop();

    match format {
        OutputFormat::Text => {
            result?;
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&one_shot_json(&result))?)
        }
    }
    Ok(())
}

fn one_shot_json(result: &Result<TurnOutcome, mcp_chatbot::AgentError>) -> serde_json::Value {
    match result {
        Ok(outcome) => serde_json::json!({
            "success": true,
            "response": outcome.response,
            "toolCalls": outcome.stats.tool_calls.iter().map(|t| &t.name).collect::<Vec<_>>(),
            "usage": {
                "inputTokens": outcome.stats.input_tokens,
                "outputTokens": outcome.stats.output_tokens,
            },
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "response": "",
            "toolCalls": [],
            "usage": null,
            "error": e.to_string(),
        }),
    }
}
