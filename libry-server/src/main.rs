//! Libry identity service

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libry_server::{
    janitor, load_or_generate_keypair, routes, AppState, Config, ConsoleEmailSender,
    ConsoleVerifier, EmailSender, IdentitySettings, InMemoryCredentialStore,
    InMemorySignupSessionStore, InMemoryUserDirectory, LocalIdentityProvider, SmtpEmailSender,
    SqliteStore, TwilioVerifier, Verifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "libry_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(port = config.port, dev = config.dev, "Loaded configuration");

    // Load or generate the identity provider's signing key
    let keypair = load_or_generate_keypair(&config.key_file)?;
    tracing::info!(kid = %keypair.kid(), "Loaded signing key");

    let mailer: Arc<dyn EmailSender> = match config.smtp.clone() {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, "Using SMTP email sender");
            Arc::new(SmtpEmailSender::new(smtp)?)
        }
        None => Arc::new(ConsoleEmailSender::new()),
    };

    let verifier: Arc<dyn Verifier> = match config.twilio.clone() {
        Some(twilio) if !config.dev => {
            tracing::info!(service_sid = %twilio.service_sid, "Using Twilio Verify");
            Arc::new(TwilioVerifier::new(twilio))
        }
        _ => {
            tracing::warn!("Using console verifier; every OTP is {}", libry_server::verify::console::DEV_CODE);
            Arc::new(ConsoleVerifier::new(config.public_base_url.clone()))
        }
    };

    let settings = IdentitySettings::from_config(&config);

    let state = match &config.database_path {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(path)?);
            tracing::info!(path = %path, "Opened SQLite database");
            let identity =
                LocalIdentityProvider::new(store.clone(), mailer, keypair, settings);
            AppState::new(config.clone(), store.clone(), store, verifier, Arc::new(identity))
        }
        None => {
            tracing::warn!("No DATABASE_PATH set, using in-memory stores");
            let identity = LocalIdentityProvider::new(
                Arc::new(InMemoryCredentialStore::new()),
                mailer,
                keypair,
                settings,
            );
            AppState::new(
                config.clone(),
                Arc::new(InMemorySignupSessionStore::new()),
                Arc::new(InMemoryUserDirectory::new()),
                verifier,
                Arc::new(identity),
            )
        }
    };
    let state = Arc::new(state);

    let _janitor = janitor::spawn(state.clone(), janitor::REAP_INTERVAL);

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
