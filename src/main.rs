use std::sync::Arc;

use dotenv::dotenv;
use support_console::{
    dtos::supportdtos::LoginDto,
    realtime::ConnectionState,
    service::{api::ApiClient, session::SessionStore},
    Config, ConsoleError, SupportConsole,
};
use tracing_subscriber::filter::LevelFilter;
use validator::Validate;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("🔥 Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let level = config.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::DEBUG);
    tracing_subscriber::fmt().with_max_level(level).init();

    let session = SessionStore::new(&config.session_file);
    let api = match authenticate(&config, &session).await {
        Ok(api) => api,
        Err(err) => {
            tracing::error!("🔥 Could not authenticate: {}", err);
            std::process::exit(1);
        }
    };

    let console = match SupportConsole::start(&config, Arc::new(api), session).await {
        Ok(console) => console,
        Err(err) => {
            tracing::error!("🔥 Could not start the support console: {}", err);
            std::process::exit(1);
        }
    };
    println!("✅ Support console connected to {}", config.api_base_url);

    let panel = console.panel();
    let mut snapshots = panel.subscribe();
    let mut connection = console.subscribe_connection();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Ctrl-C received, shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.auth_required {
                    tracing::error!("Admin session expired, log in again");
                    break;
                }

                let queries = panel.query_stats();
                let tickets = panel.ticket_stats();
                tracing::info!(
                    queries = queries.total,
                    open_queries = queries.active,
                    urgent_queries = queries.urgent,
                    tickets = tickets.total,
                    open_tickets = tickets.active,
                    urgent_tickets = tickets.urgent,
                    "Support panel updated"
                );
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = connection.borrow_and_update().clone();
                tracing::info!(failed_attempts = status.failed_attempts, "Connection {:?}", status.state);
                if status.state == ConnectionState::Exhausted {
                    tracing::error!("Gave up reconnecting, restart the console to retry");
                }
            }
        }
    }

    console.shutdown().await;
}

/// Returns a client holding a token the backend accepts, logging in with
/// `CONSOLE_EMAIL`/`CONSOLE_PASSWORD` when no valid one is stored.
async fn authenticate(config: &Config, session: &SessionStore) -> Result<ApiClient, ConsoleError> {
    let anonymous = ApiClient::new(&config.api_base_url, None);

    if let Some(token) = session.token()? {
        let api = anonymous.with_token(token);
        match api.verify_token().await {
            Ok(()) => return Ok(api),
            Err(ConsoleError::Unauthorized) => {
                tracing::warn!("Stored admin token was rejected");
                session.clear()?;
            }
            Err(e) => {
                // backend unreachable; keep the token and let the socket retry
                tracing::warn!("Could not verify stored token: {}", e);
                return Ok(api);
            }
        }
    }

    let (email, password) = match (std::env::var("CONSOLE_EMAIL"), std::env::var("CONSOLE_PASSWORD")) {
        (Ok(email), Ok(password)) => (email, password),
        _ => {
            return Err(ConsoleError::Config(
                "no stored session, set CONSOLE_EMAIL and CONSOLE_PASSWORD".to_string(),
            ))
        }
    };

    let body = LoginDto { email, password };
    body.validate()?;
    let token = anonymous.login(&body).await?;
    session.save(&token)?;
    Ok(anonymous.with_token(token))
}
