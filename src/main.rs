mod bot;
mod config;
mod download;
mod keep_alive;
mod logger;
mod search;
mod tagging;
#[cfg(test)]
mod testing;
mod utils;
mod workspace;

use {
    axum::serve,
    config::Config,
    futures::TryFutureExt,
    std::{
        future::IntoFuture,
        net::{Ipv4Addr, SocketAddr},
        sync::Arc,
    },
    tokio::{net::TcpListener, signal::ctrl_c},
    utils::Result,
};

#[tokio::main]
async fn main() -> Result {
    let config = Config::from_env()?;
    logger::init(&config.log_file, config.log_level)?;
    let bot = bot::init(&config).await?;

    let mut router = keep_alive::router();
    if config.webhook_url.is_some() {
        router = keep_alive::with_webhook(router, Arc::clone(&bot));
    }

    log::info!("Starting a server on port {}", config.port);
    let listener = TcpListener::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), config.port)).await?;
    let server = serve(listener, router)
        .with_graceful_shutdown(ctrl_c().unwrap_or_else(drop))
        .into_future();

    if config.webhook_url.is_some() {
        server.await?;
    } else {
        log::info!("Polling for updates");
        // The server only stops on Ctrl-C, which ends the polling as well
        tokio::select! {
            res = server => res?,
            () = Arc::clone(&bot).poll() => {}
        }
    }

    log::info!("Shutting down");
    let res = bot::deinit(bot).await;
    if let Err(err) = &res {
        log::error!("Failed to deinitialise the bot: {err}");
    }
    logger::deinit();
    res
}
