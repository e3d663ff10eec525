use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accounts_backend::{
    app::build_router,
    config::Config,
    db::connection::{create_pool, run_migrations},
    state::AppState,
    utils::email::SmtpMailer,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(2).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

// Hides the password component of a connection string.
fn mask_database_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable>".into(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accounts_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        app_base_url = %config.app_base_url,
        bind_addr = %config.bind_addr,
        cookie_secure = config.cookie_secure,
        session_ttl_hours = ?config.session_ttl_hours,
        session_single_per_user = config.session_single_per_user,
        password_reset_ttl_minutes = config.password_reset_ttl_minutes,
        smtp_host = %config.smtp.host,
        smtp_username = %config.smtp.username,
        smtp_password = %mask_secret(&config.smtp.password),
        smtp_skip_send = config.smtp.skip_send,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let bind_addr = config.bind_addr.clone();
    let app = build_router(AppState::from_pool(config, pool, mailer));

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
