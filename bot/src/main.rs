#[macro_use]
extern crate log;

use app::App;
use clap::Parser;
use client::TransitGateway;
use std::{path::PathBuf, sync::Arc, time::Duration};

mod app;
mod board;
mod departures;
mod markdown;
#[cfg(test)]
mod stub;
mod telegram;

const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Telegram bot listing upcoming departures near a shared location", long_about = None)]
pub struct Opts {
    #[clap(long, env = "RESROBOT_API", hide_env_values = true)]
    resrobot_key: String,
    #[clap(long, env = "TRAFIKLAB_REALTIME_API", hide_env_values = true)]
    trafiklab_key: String,
    #[clap(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_token: String,
    #[clap(long, env = "RESROBOT_URL", default_value = client::DEFAULT_RESROBOT_URL)]
    resrobot_url: String,
    #[clap(long, env = "TRAFIKLAB_URL", default_value = client::DEFAULT_TRAFIKLAB_URL)]
    trafiklab_url: String,
    #[clap(long, env = "TELEGRAM_API_URL", default_value = telegram::DEFAULT_API_URL)]
    telegram_url: String,
    /// Number of nearby stops to list departures for
    #[clap(long, env = "DEPARTURES_MAX_STOPS", default_value = "5")]
    max_stops: usize,
    /// Timeout for every call to an upstream API
    #[clap(long, env = "DEPARTURES_REQUEST_TIMEOUT_SECS", default_value = "5")]
    request_timeout_secs: u64,
    #[clap(long, env = "TELEGRAM_POLL_TIMEOUT_SECS", default_value = "30")]
    poll_timeout_secs: u64,
    /// Image sent by /map
    #[clap(long, env = "DEPARTURES_MAP_PATH", default_value = "train_map.png")]
    map_path: PathBuf,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let opts = Opts::parse();

    let mut app = match App::from_opts(opts) {
        Ok(app) => app,
        Err(e) => {
            error!("could not start: {}", e);
            std::process::exit(1);
        }
    };

    match app.telegram().get_me().await {
        Ok(me) => {
            info!("running as @{}", me.username.as_deref().unwrap_or("?"));
            app.set_username(me.username);
        }
        Err(e) => warn!("failed to look up the bot account: {}", e),
    }
    let app = Arc::new(app);

    if let Err(e) = app.register_commands().await {
        warn!("failed to register bot commands: {}", e);
    }

    info!("polling for updates");
    tokio::select! {
        _ = run(app) => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
}

async fn run<G>(app: Arc<App<G>>)
where
    G: TransitGateway + Send + Sync + 'static,
{
    let mut offset = 0;
    loop {
        let updates = match app.telegram().get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                error!("failed to fetch updates: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let app = app.clone();
            tokio::spawn(async move { app.handle_update(update).await });
        }
    }
}
