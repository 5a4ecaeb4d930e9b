#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::info;
use ttm::app::AppContext;
use ttm::ssh::prompt::TerminalPrompter;
use ttm::ssh::terminal::CrosstermTerminal;
use ttm::ssh::{STATUS_CONNECTED, SessionSettings};
use ttm::store::AppPaths;

#[derive(Parser)]
#[command(name = "ttm", version, about = "SSH bookmarks with interactive sessions")]
struct Cli {
    /// Seconds allowed for connecting and the SSH handshake (env: TTM_CONNECT_TIMEOUT)
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Trust every server key instead of checking the known_hosts file
    #[arg(long, global = true)]
    accept_any_host_key: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List bookmarks (default)
    List,
    /// Open an interactive shell on a bookmark, by id, label, title or number
    Connect { selector: String },
    /// Download bookmarks from the configured gist
    Sync,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    let paths = AppPaths::discover()?;
    paths.ensure()?;

    // The session owns the screen in raw mode, so logs go to a file.
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths.log_file())?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let settings = SessionSettings::resolve(
        cli.connect_timeout,
        cli.accept_any_host_key,
        paths.known_hosts(),
    );
    let mut app = AppContext::load(paths, settings)?;

    match cli.command.unwrap_or(Command::List) {
        Command::List => print_bookmarks(&app),
        Command::Sync => {
            app.sync().await;
            print_bookmarks(&app);
        }
        Command::Connect { selector } => {
            let shutdown = CancellationToken::new();
            spawn_termination_listener(shutdown.clone());

            info!("Activating bookmark '{}'", selector);
            let status = app
                .activate(
                    &selector,
                    Arc::new(TerminalPrompter),
                    Arc::new(CrosstermTerminal),
                    shutdown,
                )
                .await
                .to_string();
            println!("{}", status);

            // A pending stdin read would keep the runtime from shutting down.
            std::process::exit(if status == STATUS_CONNECTED { 0 } else { 1 });
        }
    }

    println!("{}", app.status());
    Ok(())
}

fn print_bookmarks(app: &AppContext) {
    for (index, bookmark) in app.bookmarks().iter().enumerate() {
        println!("{}. {}", index + 1, bookmark.label());
    }
}

fn spawn_termination_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("Termination signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut term), Ok(mut hup)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };

    tokio::select! {
        _ = term.recv() => {}
        _ = hup.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
