//! CAS endpoints.

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::cas::CasError;

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ServiceTicketRequest {
    #[serde(default)]
    pub tgt: String,
    #[serde(default)]
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceTicketResponse {
    pub ticket: String,
    pub service: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceValidateParams {
    #[serde(default)]
    pub ticket: String,
    #[serde(default)]
    pub service: String,
}

/// Successful `serviceValidate` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceValidateResponse {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub service: String,
}

/// `POST /cas/tickets`: mints a service ticket from a TGT.
pub async fn create_ticket_handler(
    State(state): State<AppState>,
    form: Result<Form<ServiceTicketRequest>, FormRejection>,
) -> Response {
    let request = form.map(|Form(r)| r).unwrap_or_default();
    if request.tgt.is_empty() || request.service.is_empty() {
        return AuthError::invalid_request("tgt and service are required").into_response();
    }

    match state.cas.create_st(&request.tgt, &request.service).await {
        Ok(st) => {
            tracing::debug!(service = %st.service, user_id = %st.user_id, "Service ticket issued");
            (
                StatusCode::CREATED,
                Json(ServiceTicketResponse {
                    ticket: st.ticket,
                    service: st.service,
                }),
            )
                .into_response()
        }
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// `GET /cas/serviceValidate?ticket=...&service=...`
pub async fn service_validate_handler(
    State(state): State<AppState>,
    Query(params): Query<ServiceValidateParams>,
) -> Response {
    if params.ticket.is_empty() || params.service.is_empty() {
        return AuthError::invalid_request("ticket and service are required").into_response();
    }

    let st = match state.cas.validate_st(&params.ticket, &params.service).await {
        Ok(st) => st,
        Err(e) => {
            tracing::debug!(service = %params.service, error = %e, "Service ticket rejected");
            return AuthError::from(e).into_response();
        }
    };

    let account = match state.accounts.find_by_id(&st.user_id).await {
        Ok(account) => account,
        Err(e) => return AuthError::from(e).into_response(),
    };

    Json(ServiceValidateResponse {
        user: st.user_id,
        username: account.as_ref().map(|a| a.username.clone()),
        email: account.and_then(|a| a.email),
        service: st.service,
    })
    .into_response()
}

/// `DELETE /cas/tickets/{tgt}`: single sign-out.
///
/// Removes the TGT and the session it belongs to. Unknown TGTs succeed.
pub async fn logout_handler(State(state): State<AppState>, Path(tgt_id): Path<String>) -> Response {
    let result = async {
        match state.cas.get_tgt(&tgt_id).await {
            Ok(tgt) => state.cas.delete_session(&tgt.session_id).await?,
            Err(CasError::TgtNotFound | CasError::TgtExpired) => {}
            Err(e) => return Err(e),
        }
        state.cas.delete_tgt(&tgt_id).await
    }
    .await;

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AuthError::from(e).into_response(),
    }
}
