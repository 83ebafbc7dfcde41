use clap::Parser;
use client::game::GameData;
use client::input::{Autopilot, InputSource, JetpackToggle};
use client::network::NetworkClient;
use log::{error, info};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless jetpack arena client", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Log every packet sent and received
    #[arg(short, long)]
    debug: bool,

    /// Fly automatically instead of reading commands from stdin
    #[arg(long)]
    autopilot: bool,
}

/// Flips the jetpack every time a line is entered on stdin.
fn spawn_stdin_toggle(toggle: JetpackToggle) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            let held = toggle.toggle();
            info!("Jetpack {}", if held { "on" } else { "off" });
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut input: Box<dyn InputSource + Send> = if args.autopilot {
        info!("Autopilot enabled");
        Box::new(Autopilot::default())
    } else {
        info!("Press Enter to toggle the jetpack");
        let toggle = JetpackToggle::new();
        spawn_stdin_toggle(toggle.clone());
        Box::new(toggle)
    };

    let addr = format!("{}:{}", args.host, args.port);
    let mut network = match NetworkClient::connect(&addr, GameData::shared(), args.debug).await {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to connect to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => {
                error!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    match network.run(&mut input, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Session ended: {}", e);
            ExitCode::FAILURE
        }
    }
}
