//! Message submission and listing endpoints.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::dispatch::{MessageList, INVALID_STATUS_MESSAGE};
use crate::error::{AppError, Result};
use crate::server::AppState;

pub const SEND_SUCCESS_MESSAGE: &str = "Successfully sent";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListMessagesParams {
    pub status: Option<String>,
}

impl ListMessagesParams {
    /// Collect known parameters from decoded query pairs.
    ///
    /// A repeated `status` resolves to its last value.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let status = pairs
            .into_iter()
            .filter(|(key, _)| key == "status")
            .map(|(_, value)| value)
            .last();

        Self { status }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: String,
}

/// GET /messages?status=SENT
#[tracing::instrument(name = "http.list_messages", skip_all)]
pub async fn list_messages(
    State(state): State<AppState>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<MessageList>> {
    let Query(pairs) = query.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable query string");
        AppError::bad_request(INVALID_STATUS_MESSAGE)
    })?;
    let params = ListMessagesParams::from_pairs(pairs);

    let list = state.query_service.list(params.status.as_deref()).await?;
    Ok(Json(list))
}

/// POST /message/send
///
/// Takes the raw body so that malformed JSON gets the same 400 as a missing
/// `text` field instead of axum's extractor rejection.
#[tracing::instrument(name = "http.send_message", skip(state, body))]
pub async fn send_message(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SendMessageResponse>)> {
    state.dispatcher.send(&body).await?;

    // 204 with a body; hyper may drop the body on the wire
    Ok((
        StatusCode::NO_CONTENT,
        Json(SendMessageResponse {
            message: SEND_SUCCESS_MESSAGE.to_string(),
        }),
    ))
}
