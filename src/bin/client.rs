//! Research Node interactive client
//!
//! Starts `research-server` as a child process, shows its tools, then routes
//! each line typed at the prompt to one of them.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use research_node::logging::init_logging;
use research_node::mcp::{StdioSession, ToolCallResult, ToolDefinition};
use research_node::router::{is_exit, Router};

const SERVER_BINARY: &str = "research-server";
const DESCRIPTION_WIDTH: usize = 72;

#[derive(Parser, Debug)]
#[command(name = "research-client")]
#[command(about = "Interactive client for the Research Node tool server")]
#[command(version)]
struct Args {
    /// Server executable (defaults to research-server next to this binary)
    #[arg(long, env = "RESEARCH_SERVER_CMD")]
    server_command: Option<String>,

    /// Extra argument passed to the server (repeatable)
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Directory for the JSON log file
    #[arg(long, env = "RESEARCH_LOG_DIR", default_value = "logs")]
    log_dir: String,
}

/// Sibling `research-server` when it exists, else rely on PATH
fn default_server_command() -> String {
    let sibling = std::env::current_exe().ok().and_then(|exe| {
        let candidate = exe
            .parent()?
            .join(format!("{}{}", SERVER_BINARY, std::env::consts::EXE_SUFFIX));
        candidate.exists().then_some(candidate)
    });

    match sibling {
        Some(path) => path.to_string_lossy().into_owned(),
        None => SERVER_BINARY.to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn print_banner() {
    println!();
    println!("{}", "Research Node".bold().cyan());
    println!(
        "{}",
        "Type a question, an expression, or 'history'. 'exit' or 'quit' to leave.".dimmed()
    );
    println!();
}

fn print_tool_table(tools: &[ToolDefinition]) {
    let name_width = tools
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0)
        .max("Tool".len());

    println!("{}", "Available Tools".bold());
    println!(
        "  {}  {}",
        format!("{:<width$}", "Tool", width = name_width).cyan().bold(),
        "Description".bold()
    );
    for tool in tools {
        println!(
            "  {}  {}",
            format!("{:<width$}", tool.name, width = name_width).cyan(),
            truncate(&tool.description, DESCRIPTION_WIDTH)
        );
    }
    println!();
}

fn create_tool_spinner(tool: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Running {}...", tool));
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_result(tool: &str, result: &ToolCallResult) {
    let text = result.first_text().unwrap_or_default();
    if result.is_error() {
        print_error(text);
        return;
    }

    println!("{}", format!("── Result: {} ──", tool).green().bold());
    println!("{}", text);
    println!();
}

fn print_error(message: impl std::fmt::Display) {
    println!("{} {}", "Error executing tool:".red().bold(), message);
    println!();
}

fn prompt() -> Result<()> {
    print!("{} ", ">".bold().magenta());
    std::io::stdout().flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_dir = PathBuf::from(shellexpand::tilde(&args.log_dir).to_string());
    init_logging(&log_dir, false)?;

    let command = args.server_command.unwrap_or_else(default_server_command);

    print_banner();

    let mut session = StdioSession::spawn(&command, &args.server_args)
        .await
        .with_context(|| format!("starting tool server `{}`", command))?;

    let info = session
        .client()
        .initialize()
        .await
        .context("initializing MCP session")?;
    tracing::info!(
        server = %info.server_info.name,
        version = %info.server_info.version,
        "Connected to tool server"
    );

    let tools = session.client().list_tools().await?;
    print_tool_table(&tools);

    let router = Router::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            break;
        }

        let route = router.route(input);
        tracing::info!(tool = route.tool, input, "Dispatching");

        let spinner = create_tool_spinner(route.tool);
        let outcome = session
            .client()
            .call_tool(route.tool, route.arguments)
            .await;
        spinner.finish_and_clear();

        match outcome {
            Ok(result) => print_result(route.tool, &result),
            Err(e) => {
                tracing::error!(tool = route.tool, error = %e, "Tool call failed");
                print_error(e);
            }
        }
    }

    println!("{}", "Goodbye.".dimmed());
    session.shutdown().await?;
    Ok(())
}
