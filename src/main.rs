mod config;
mod cowork;
mod format;
mod llm;
mod office;
mod orchestrator;
mod rag;
mod routing;
mod tools;
mod translation;
mod types;
mod ui;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::{Settings, moabot_home_dir};
use crate::orchestrator::Orchestrator;
use crate::ui::dashboard::{ConsoleDashboard, Dashboard, NullDashboard};

#[tokio::main]
async fn main() -> Result<()> {
    // Windows conhost needs UTF-8 or the emoji markers come out mangled.
    #[cfg(windows)]
    {
        unsafe extern "system" {
            fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
            fn SetConsoleCP(wCodePageID: u32) -> i32;
        }
        unsafe {
            SetConsoleOutputCP(65001);
            SetConsoleCP(65001);
        }
    }

    // Create ~/.moabot/.env from the template if it doesn't exist yet.
    ensure_dot_env();
    let _ = dotenvy::from_path(moabot_home_dir().join(".env"));
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_cli_args();
    let settings = Settings::load();
    let dashboard: Arc<dyn Dashboard> = if args.quiet {
        Arc::new(NullDashboard)
    } else {
        Arc::new(ConsoleDashboard)
    };
    let orchestrator = Orchestrator::new(&settings, dashboard)?;

    if args.interactive {
        return interactive_mode(&orchestrator).await;
    }

    let Some(query) = args.query else {
        print_usage();
        return Ok(());
    };

    let reply = if args.cowork {
        orchestrator.run_cowork(&query).await?
    } else {
        orchestrator.run(&query).await?
    };
    println!("{reply}");
    Ok(())
}

async fn interactive_mode(orchestrator: &Orchestrator) -> Result<()> {
    println!("🤖 MoaBot interactive mode — tools, multi-agent plans, multilingual replies.");
    println!("   Type 'quit' or 'exit' to leave.\n");

    let stdin = std::io::stdin();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("👋 Bye!");
            break;
        }
        match orchestrator.run(input).await {
            Ok(reply) => println!("\n{reply}\n"),
            Err(e) => {
                tracing::error!(error = ?e, "request failed");
                println!("\n⚠️ The request failed: {e}\n");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct CliArgs {
    query: Option<String>,
    interactive: bool,
    cowork: bool,
    quiet: bool,
}

/// Supported flags:
///   -q / --query <text>   Run a single request and print the reply.
///   -i / --interactive    REPL mode.
///   --cowork              Force the multi-task plan flow for the query.
///   --quiet               Suppress the live dashboard output.
fn parse_cli_args() -> CliArgs {
    let argv: Vec<String> = std::env::args().collect();
    let mut args = CliArgs::default();
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "-q" | "--query" if i + 1 < argv.len() => {
                args.query = Some(argv[i + 1].clone());
                i += 2;
            }
            "-i" | "--interactive" => {
                args.interactive = true;
                i += 1;
            }
            "--cowork" => {
                args.cowork = true;
                i += 1;
            }
            "--quiet" => {
                args.quiet = true;
                i += 1;
            }
            other => {
                // A bare trailing argument is treated as the query.
                if args.query.is_none() && !other.starts_with('-') {
                    args.query = Some(other.to_string());
                }
                i += 1;
            }
        }
    }
    args
}

fn print_usage() {
    println!("MoaBot — local small-model mixture-of-agents orchestrator");
    println!();
    println!("Usage:");
    println!("  moabot -q \"Seoul weather?\"          one-shot request");
    println!("  moabot -q \"...\" --cowork            multi-task plan mode (report auto-saved)");
    println!("  moabot -i                             interactive mode");
    println!();
    println!("Configuration: ~/.moabot/.env, ~/.moabot/config.toml, MOA_* env vars.");
}

/// If `~/.moabot/.env` doesn't exist, create it from the bundled template.
fn ensure_dot_env() {
    let home = moabot_home_dir();
    let env_path = home.join(".env");
    if env_path.exists() {
        return;
    }
    let _ = std::fs::create_dir_all(&home);
    let _ = std::fs::write(&env_path, include_str!("../.env.example"));
}
