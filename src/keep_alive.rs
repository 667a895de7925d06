use {
    crate::bot::{telegram::Update, Bot},
    axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    },
    std::sync::Arc,
};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

async fn home() -> &'static str {
    "I'm running"
}

/// Answers health checks of the hosting platform.
pub fn router() -> Router {
    Router::new().route("/", get(home))
}

/// Adds the `/bot` route Telegram delivers updates to in webhook mode.
pub fn with_webhook(router: Router, bot: Arc<Bot>) -> Router {
    router.merge(Router::new().route("/bot", post(receive_update)).with_state(bot))
}

fn is_authorised(expected: Option<&str>, headers: &HeaderMap) -> bool {
    expected.is_none_or(|secret| {
        headers.get(SECRET_HEADER).is_some_and(|value| value.as_bytes() == secret.as_bytes())
    })
}

async fn receive_update(
    State(bot): State<Arc<Bot>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if !is_authorised(bot.webhook_secret(), &headers) {
        log::warn!("Rejected an update with a wrong secret token");
        return StatusCode::UNAUTHORIZED;
    }
    // Downloads outlive Telegram's webhook timeout
    tokio::spawn(async move { bot.dispatch(&update).await });
    StatusCode::OK
}
