use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use atlantic_explorer::report::{default_output_name, explore, write_report, ExplorerReport};
use atlantic_explorer::{EntryConfig, MessageLogMode, OverkizClient, Registry, Server};

const RULE: &str = concat!(
    "========================================",
    "========================================"
);

/// Dump everything the Overkiz/Cozytouch cloud knows about an account.
#[derive(Debug, Parser)]
#[command(name = "explore", version)]
struct Cli {
    /// Cozytouch account email
    #[arg(short, long, env = "COZYTOUCH_EMAIL", required_unless_present = "list_servers")]
    email: Option<String>,

    /// Cozytouch account password
    #[arg(
        short,
        long,
        env = "COZYTOUCH_PASSWORD",
        hide_env_values = true,
        required_unless_present = "list_servers"
    )]
    password: Option<String>,

    /// Server to connect to
    #[arg(short, long, default_value = "atlantic_cozytouch")]
    server: String,

    /// Output file path (default: atlantic_api_dump_<timestamp>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List available servers and exit
    #[arg(long)]
    list_servers: bool,

    /// After writing the report, keep polling and log changes until Ctrl-C
    #[arg(long)]
    watch: bool,

    /// Write every request and response to this file as JSON lines
    #[arg(long, value_name = "PATH")]
    message_log: Option<PathBuf>,

    /// Only log what changed between successive responses on the same path
    #[arg(long, requires = "message_log")]
    diff_messages: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list_servers {
        println!("Available servers:");
        for server in Server::all() {
            println!("  - {server} ({})", server.name());
        }
        return ExitCode::SUCCESS;
    }

    let email = cli.email.clone().unwrap_or_default();
    let password = cli.password.clone().unwrap_or_default();

    println!("\n{RULE}");
    println!("ATLANTIC HEAT PUMP API EXPLORER");
    println!("{RULE}");
    println!("Server: {}", cli.server);
    println!("Email: {email}");
    println!("Time: {}", chrono::Local::now().to_rfc3339());
    println!("{RULE}\n");

    let report = match Server::from_str(&cli.server) {
        Ok(server) => match build_client(&cli, server, &email, &password) {
            Ok(mut client) => explore(&mut client, server, &email).await,
            Err(e) => ExplorerReport::Failed {
                error: e.to_string(),
            },
        },
        Err(_) => {
            let names: Vec<String> = Server::all().map(|s| s.to_string()).collect();
            eprintln!("Error: Unknown server '{}'", cli.server);
            eprintln!("Available servers: {}", names.join(", "));
            ExplorerReport::Failed {
                error: format!("Unknown server '{}'", cli.server),
            }
        }
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_name()));
    if let Err(e) = write_report(&report, &output) {
        eprintln!("Error: could not write {}: {e}", output.display());
        return ExitCode::FAILURE;
    }

    println!("\n{RULE}");
    println!("Report saved to: {}", output.display());
    println!("{RULE}");
    print_summary(&report);

    if cli.watch
        && let Ok(server) = Server::from_str(&cli.server)
    {
        watch(&cli, server, &email, &password).await;
    }

    ExitCode::SUCCESS
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn build_client(
    cli: &Cli,
    server: Server,
    email: &str,
    password: &str,
) -> atlantic_explorer::Result<OverkizClient> {
    let mut builder = OverkizClient::builder(server, email, password);
    if let Some(path) = &cli.message_log {
        let mode = if cli.diff_messages {
            MessageLogMode::Diffed
        } else {
            MessageLogMode::Full
        };
        builder = builder.message_log(mode, path.clone());
    }
    builder.build()
}

fn print_summary(report: &ExplorerReport) {
    match report {
        ExplorerReport::Failed { error } => println!("\nExploration failed: {error}"),
        ExplorerReport::Complete(report) => {
            println!("\nSUMMARY:");
            println!("  Gateways: {}", report.gateways.len());
            println!("  Devices: {}", report.devices.len());
            println!("  Total States: {}", report.total_states());
            println!("  Total Commands: {}", report.total_commands());
            if !report.errors.is_empty() {
                println!("  Errors: {}", report.errors.len());
                for error in &report.errors {
                    println!("    - {}: {}", error.context, error.error);
                }
            }
        }
    }
}

async fn watch(cli: &Cli, server: Server, email: &str, password: &str) {
    let client = match build_client(cli, server, email, password) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Watch: {e}");
            return;
        }
    };
    let config = EntryConfig::new(email, password, server);
    let entry_id = config.unique_id();

    let mut registry = Registry::new();
    if let Err(e) = registry.setup_entry(entry_id.clone(), config, client).await {
        eprintln!("Watch: {e}");
        return;
    }
    let Some(entry) = registry.get_mut(&entry_id) else {
        return;
    };

    println!(
        "\nWatching {} device(s) every {}s. Press Ctrl-C to stop.",
        entry.coordinator.devices().len(),
        entry.coordinator.update_interval().as_secs()
    );
    entry
        .coordinator
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("cannot listen for Ctrl-C, stopping: {e}");
            }
        })
        .await;
    println!(
        "Stopped after {} event(s).",
        entry.coordinator.event_count()
    );

    registry.unload_entry(&entry_id).await;
}
