use std::sync::{Arc, Mutex};

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use tokio::sync::oneshot;
use url::Url;

pub(crate) const SUCCESS_HTML: &str = include_str!("html/success.html");
pub(crate) const ERROR_HTML: &str = include_str!("html/error.html");

/// The interesting parts of the consent redirect.
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub code: String,
    pub state: Option<String>,
}

type CallbackSender = oneshot::Sender<CallbackQuery>;
pub(super) type SharedCallbackSender = Arc<Mutex<Option<CallbackSender>>>;

#[derive(Clone)]
pub(super) struct ListenerState {
    pub(super) callback_url_base: String,
    pub(super) callback_tx: SharedCallbackSender,
}

/// Resolve the session at most once; later requests are accepted but ignored.
fn send_callback(callback_tx: &SharedCallbackSender, callback: CallbackQuery) {
    if let Ok(mut guard) = callback_tx.lock() {
        if let Some(sender) = guard.take() {
            let _ = sender.send(callback);
        }
    }
}

pub(super) async fn callback_handler(
    State(state): State<ListenerState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let query = query.unwrap_or_default();

    let callback_url = if query.is_empty() {
        state.callback_url_base.clone()
    } else {
        format!("{}?{}", state.callback_url_base, query)
    };

    let url = match Url::parse(&callback_url) {
        Ok(url) => url,
        Err(err) => {
            // Best effort; the session timeout is the backstop here.
            tracing::warn!(error = %err, "malformed callback request");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!(
                    "<html><body><h2>Server error</h2><p>{err}</p></body></html>"
                )),
            );
        }
    };

    let mut code = None;
    let mut returned_state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => returned_state = Some(value.to_string()),
            _ => {}
        }
    }

    match code {
        Some(code) => {
            send_callback(
                &state.callback_tx,
                CallbackQuery {
                    code,
                    state: returned_state,
                },
            );
            (StatusCode::OK, Html(SUCCESS_HTML.to_string()))
        }
        None => (StatusCode::BAD_REQUEST, Html(ERROR_HTML.to_string())),
    }
}

pub(super) async fn fallback_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(ERROR_HTML.to_string()))
}
