//! AICom — companion entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the completion transport
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Spawn the session run-loop
//!   8. Run the comms channel (console or pipe) until it exits
//!   9. Cancel token + join session

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use aicom::error::AppError;
use aicom::session::Companion;
use aicom::{comms, config, llm, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level)?;

    info!(
        transport = %config.ai.transport,
        base_url = %config.ai.base_url,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = %args.interactive,
        "config loaded"
    );

    let transport = llm::providers::build(&config.ai, &config.chat)
        .map_err(|e| AppError::Config(e.to_string()))?;

    // Shared shutdown token — Ctrl-C cancels it, all tasks watch it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let companion = Companion::new(transport, &config.chat, event_tx);
    let session = tokio::spawn(companion.run(cmd_rx, shutdown.clone()));

    if args.interactive {
        print_startup_summary(&config);
    }

    let channel = comms::start(args.interactive, cmd_tx, event_rx, shutdown.clone());
    let result = channel.join().await;

    // Channel exited (EOF, /quit, pipe done, error) — stop everything else.
    shutdown.cancel();
    session.await.ok();

    if args.interactive {
        use std::io::Write as _;
        println!("\nBye :) ...");
        let _ = std::io::stdout().flush();
    }

    result
}

fn print_startup_summary(config: &config::Config) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 52;
        let count = text.chars().count();
        if count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let key_line = if config.ai.api_key.is_some() { "set" } else { "not set" };
    let sampling = format!(
        "top_k={} top_p={} temp={} repeat={}",
        config.chat.top_k, config.chat.top_p, config.chat.temperature, config.chat.repeat_penalty
    );

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║ AICom companion                                      ║");
    println!("╟──────────────────────────────────────────────────────╢");
    println!("║ {}║", fit(format!("transport: {}", config.ai.transport)));
    println!("║ {}║", fit(format!("endpoint:  {}", config.ai.base_url)));
    println!("║ {}║", fit(format!("api key:   {key_line}")));
    println!("║ {}║", fit(format!(
        "persona:   {}  (tick {}ms)",
        config.chat.user_name, config.chat.token_speed_ms
    )));
    println!("║ {}║", fit(format!("sampling:  {sampling}")));
    println!("╚══════════════════════════════════════════════════════╝");
    println!("💡 /go to bind the conversation, /help for commands");
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: aicom [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Run the console channel (default: pipe stdin→stdout)");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // Each -v raises verbosity one tier from the config default:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug
    //   -vvvv+  → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}
