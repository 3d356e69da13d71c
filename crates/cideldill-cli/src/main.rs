//! The `cideldill-server` binary: starts the breakpoint control plane,
//! grounded on `cideldill/__main__.py`'s env-config-then-serve shape and
//! startup banner.

mod mcp;
mod port_discovery;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use cideldill_breakpoint::BreakpointManager;
use cideldill_store::{default_db_path, DbLocation};

#[derive(Parser)]
#[command(name = "cideldill-server")]
#[command(about = "Start the CID el Dill breakpoint control plane")]
struct Cli {
    /// Port to listen on. Falls back to an OS-assigned port if already in use.
    #[arg(long, env = "CIDELDILL_PORT", default_value_t = 5000)]
    port: u16,

    /// Host/address to bind to.
    #[arg(long, env = "CIDELDILL_BIND_ADDR", default_value = "0.0.0.0")]
    host: String,

    /// Path to the sqlite3 database file. Defaults to a timestamped file
    /// under `~/.cideldill/breakpoint_dbs/`.
    #[arg(long, env = "CIDELDILL_DB")]
    db: Option<PathBuf>,

    /// Use an in-memory database (discarded on exit).
    #[arg(long)]
    memory: bool,

    /// Log Breakpoint Manager events as MCP-style notifications.
    #[arg(long)]
    mcp: bool,

    /// Same as `--mcp`; kept as a separate flag for callers that start an
    /// SSE-based MCP bridge out of process and just want the notifications.
    #[arg(long = "mcp-sse")]
    mcp_sse: bool,
}

fn resolve_home() -> PathBuf {
    std::env::var("CIDELDILL_HOME").map(PathBuf::from).unwrap_or_else(|_| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}

fn resolve_db_location(cli: &Cli, home: &std::path::Path) -> DbLocation {
    if cli.memory {
        return DbLocation::Memory;
    }
    if let Some(path) = &cli.db {
        return DbLocation::Path(path.clone());
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    DbLocation::Path(default_db_path(home, now))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,cideldill=debug".into())).init();

    let cli = Cli::parse();
    let home = resolve_home();
    let db_location = resolve_db_location(&cli, &home);
    let db_label = match &db_location {
        DbLocation::Memory => ":memory:".to_string(),
        DbLocation::Path(p) => p.display().to_string(),
    };

    println!("{}", "=".repeat(60));
    println!("CID el Dill - Interactive Breakpoint Server");
    println!("{}", "=".repeat(60));
    println!("\nStarting server on {}:{}", cli.host, cli.port);
    println!("Database: {db_label}");
    println!("\nAPI Endpoints:");
    println!("  GET    /api/breakpoints        - List breakpoints");
    println!("  POST   /api/breakpoints        - Add breakpoint");
    println!("  DELETE /api/breakpoints/<name> - Remove breakpoint");
    println!("  GET    /api/paused             - List paused executions");
    println!("  POST   /api/paused/<id>/continue - Continue execution");
    println!("  GET    /api/debug-client.js     - Embedded JS client");
    println!("\nPress Ctrl+C to stop the server");
    println!("{}", "=".repeat(60));
    println!();

    let db = Arc::new(std::sync::Mutex::new(cideldill_store::Database::open(db_location)?));
    let breakpoints = Arc::new(BreakpointManager::new(db.clone()));

    if cli.mcp || cli.mcp_sse {
        breakpoints.subscribe(Arc::new(mcp::mcp_notification_sink));
    }

    let listener = bind_listener(&cli.host, cli.port).await?;
    let bound_port = listener.local_addr()?.port();
    if bound_port != cli.port {
        tracing::warn!(requested_port = cli.port, bound_port, "requested port was in use, bound a free one instead");
    }

    let port_file = port_discovery::discovery_file_path(&home);
    if let Err(e) = port_discovery::write_port_file(bound_port, &port_file) {
        tracing::warn!(error = %e, path = %port_file.display(), "failed to write port discovery file");
    }

    let base_url = std::env::var("CIDELDILL_SERVER_URL").unwrap_or_else(|_| format!("http://localhost:{bound_port}"));
    let state = Arc::new(cideldill_server::AppState::new(breakpoints, db, base_url));
    let app = cideldill_server::build_router(state);

    tracing::info!(port = bound_port, "cideldill-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            tracing::warn!(requested_port = port, "port in use, falling back to an OS-assigned port");
            Ok(TcpListener::bind((host, 0)).await?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_db_location_honors_memory_flag() {
        let cli = Cli { port: 0, host: "0.0.0.0".into(), db: None, memory: true, mcp: false, mcp_sse: false };
        assert!(matches!(resolve_db_location(&cli, std::path::Path::new("/home/alice")), DbLocation::Memory));
    }

    #[test]
    fn resolve_db_location_honors_explicit_path() {
        let cli = Cli { port: 0, host: "0.0.0.0".into(), db: Some(PathBuf::from("/tmp/custom.sqlite3")), memory: false, mcp: false, mcp_sse: false };
        match resolve_db_location(&cli, std::path::Path::new("/home/alice")) {
            DbLocation::Path(p) => assert_eq!(p, PathBuf::from("/tmp/custom.sqlite3")),
            DbLocation::Memory => panic!("expected a path"),
        }
    }

    #[test]
    fn resolve_db_location_defaults_under_home() {
        let cli = Cli { port: 0, host: "0.0.0.0".into(), db: None, memory: false, mcp: false, mcp_sse: false };
        match resolve_db_location(&cli, std::path::Path::new("/home/alice")) {
            DbLocation::Path(p) => assert!(p.starts_with("/home/alice/.cideldill/breakpoint_dbs")),
            DbLocation::Memory => panic!("expected a path"),
        }
    }
}
