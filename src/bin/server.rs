use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ledger_rs::{
    AppState, DEFAULT_ALLOWED_ORIGIN, DbSettings, SessionFactory, build_router, cors_layer,
    graceful_shutdown, logging_middleware,
};

/// The REST API server for ledger_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The address to serve the API from.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// A browser origin allowed to call the API, may be repeated or comma separated.
    #[arg(
        long = "allowed-origin",
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_ORIGIN
    )]
    allowed_origins: Vec<String>,

    /// The maximum number of open database connections.
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = DbSettings::default().pool_max_size)]
    pool_size: u32,

    /// How long to wait for a locked database before giving up, in milliseconds.
    #[arg(long, env = "DB_BUSY_TIMEOUT_MS", default_value_t = DbSettings::default().busy_timeout_ms)]
    busy_timeout_ms: u64,

    /// The log filter used when `RUST_LOG` is not set, e.g. "debug" or "ledger_rs=debug,info".
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(&args.log_level);

    let settings = DbSettings {
        busy_timeout_ms: args.busy_timeout_ms,
        pool_max_size: args.pool_size,
    };
    let session_factory =
        SessionFactory::new(&args.db_path, settings).expect("Could not open the database");
    tracing::info!("Opened database at {} with {:?}", args.db_path, settings);

    let cors = cors_layer(&args.allowed_origins).expect("Invalid allowed origin");
    tracing::info!("Allowing cross-origin requests from {:?}", args.allowed_origins);

    let router = build_router(AppState::new(session_factory), cors)
        .layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let addr = SocketAddr::new(args.host, args.port);
    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server error");
}

fn setup_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
