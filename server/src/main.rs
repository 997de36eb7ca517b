use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rostrum_server::config::ServerConfig;
use rostrum_server::db::pool::{create_pool, run_migrations};
use rostrum_server::hub::presence_hub::PresenceHub;
use rostrum_server::push::dispatcher::PushDispatcher;
use rostrum_server::push::vapid::VapidKeys;
use rostrum_server::web::app_state::AppState;
use rostrum_server::web::router::build_router;

#[derive(Parser)]
#[command(name = "rostrum-server", about = "Debate room presence and push server")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "rostrum.toml")]
    config: String,

    /// Generate a fresh VAPID key pair, print it, and exit
    #[arg(long)]
    generate_vapid_key: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.generate_vapid_key {
        let (keys, pem) = VapidKeys::generate("mailto:admin@localhost".into())
            .expect("failed to generate VAPID key pair");
        println!("{pem}");
        println!("public key: {}", keys.public_key());
        return;
    }

    let config = ServerConfig::load(&args.config);

    // Initialize database
    let pool = create_pool(&config.database.url)
        .await
        .expect("failed to connect to database");

    run_migrations(&pool)
        .await
        .expect("failed to run database migrations");

    let keys = match &config.push.vapid_private_key_file {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("failed to read VAPID key file {}: {}", path, e));
            VapidKeys::from_pem(&pem, config.push.contact.clone())
                .expect("failed to load VAPID key")
        }
        None => {
            // Dev fallback. Subscriptions made against this key die with the process.
            warn!("No VAPID key file configured, generating an ephemeral key pair");
            let (keys, _) = VapidKeys::generate(config.push.contact.clone())
                .expect("failed to generate VAPID key pair");
            keys
        }
    };

    let dispatcher = PushDispatcher::new(pool.clone(), keys, config.push.ttl_seconds);

    let app_state = Arc::new(AppState {
        hub: Arc::new(PresenceHub::new()),
        db: pool,
        dispatcher,
        public_url: config.server.public_url.clone(),
    });

    let app = build_router(app_state);

    info!("Rostrum server starting on {}", config.server.web_address);

    let listener = tokio::net::TcpListener::bind(&config.server.web_address)
        .await
        .expect("failed to bind web listener");

    axum::serve(listener, app)
        .await
        .expect("server error");
}
