//! HTTP surface: one POST endpoint per form.
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError, web};

use crate::forms::submission::FormKind;
use crate::intake::{IntakeLimits, read_submission};
use crate::services::SubmissionError;
use crate::services::submission::SubmissionService;

/// Body that tells the browser agent the message went out.
pub const SUCCESS_BODY: &str = "success";

/// Shared state handed to every handler.
pub struct AppState {
    pub service: SubmissionService,
    pub limits: IntakeLimits,
}

impl ResponseError for SubmissionError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body(self.user_message())
    }
}

/// Register the form endpoints. Any method other than POST gets a 405.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/contact")
            .route(web::post().to(submit_contact))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/quote")
            .route(web::post().to(submit_quote))
            .default_service(web::route().to(method_not_allowed)),
    );
}

pub async fn submit_contact(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, SubmissionError> {
    submit(FormKind::Contact, state, payload).await
}

pub async fn submit_quote(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, SubmissionError> {
    submit(FormKind::Quote, state, payload).await
}

async fn submit(
    kind: FormKind,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, SubmissionError> {
    let request = read_submission(payload, kind, &state.limits)
        .await
        .inspect_err(|e| log::info!("{} submission rejected on intake: {e}", kind.label()))?;

    let service = state.service.clone();
    web::block(move || service.process(kind, request))
        .await
        .map_err(|e| SubmissionError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(SUCCESS_BODY))
}

pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .content_type(ContentType::plaintext())
        .body("Method not allowed.")
}
