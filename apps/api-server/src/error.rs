//! Failure-to-response translation.
//!
//! Handlers return [`AppError`]. Its `IntoResponse` only records the failure
//! in the response extensions; the [`translate_errors`] middleware then asks
//! the [`ErrorTranslator`] (which knows the deployment environment) to build
//! the final status, body and log line. Clients only ever see an
//! [`ErrorBody`].
//!
//! Panics inside a handler are caught by [`catch_panics`] and rendered by the
//! same translator as an unexpected failure. Unknown paths and unsupported
//! methods go through [`unknown_route`] and [`method_not_allowed`].

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Request, State,
    },
    http::{Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use domain::CoreError;
use http_common::{generate_tracking_id, ErrorBody, UNEXPECTED_ERROR_MESSAGE};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};
use tracing::{error, warn};

use crate::config::AppEnvironment;

pub const VALIDATION_FAILED_MESSAGE: &str = "One or more validation errors occurred.";

/// Failure raised while serving a request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    /// Malformed request that never reached the service.
    #[error("{0}")]
    BadRequest(String),
    #[error("No resource found at '{0}'.")]
    RouteNotFound(String),
    #[error("Method {method} is not allowed on '{path}'.")]
    MethodNotAllowed { method: String, path: String },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(CoreError::NotFound(_)) | AppError::RouteNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Core(CoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Core(CoreError::Validation(_)) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Core(CoreError::Repository(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut res = self.status().into_response();
        res.extensions_mut().insert(Arc::new(self));
        res
    }
}

/// Maps failure kinds to status codes and JSON bodies.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator {
    environment: AppEnvironment,
}

impl ErrorTranslator {
    pub fn new(environment: AppEnvironment) -> Self {
        Self { environment }
    }

    /// Build the status and body for `err` and log it. Unexpected failures get
    /// a fresh tracking id; their detail is only exposed in development.
    pub fn translate(&self, err: &AppError) -> (StatusCode, ErrorBody) {
        let status = err.status();
        let code = status.as_u16();

        if status.is_server_error() {
            let tracking_id = generate_tracking_id();
            error!(tracking_id = %tracking_id, status = code, err = ?err, "unexpected failure");
            let body = if self.environment.is_development() {
                ErrorBody::new(code, err.to_string()).with_stack_trace(format!("{:#?}", err))
            } else {
                ErrorBody::new(code, UNEXPECTED_ERROR_MESSAGE)
            };
            return (status, body.with_tracking_id(tracking_id));
        }

        warn!(status = code, err = %err, "request failed");
        let body = match err {
            AppError::Core(CoreError::Validation(fields)) => ErrorBody::new(
                code,
                VALIDATION_FAILED_MESSAGE,
            )
            .with_field_errors(
                fields
                    .iter()
                    .map(|f| (f.field.to_string(), f.message.clone())),
            ),
            other => ErrorBody::new(code, other.to_string()),
        };
        (status, body)
    }

    pub fn render(&self, err: &AppError) -> Response {
        let (status, body) = self.translate(err);
        (status, Json(body)).into_response()
    }
}

/// Middleware replacing any response that carries an [`AppError`] with the
/// translated error response.
pub async fn translate_errors(
    State(translator): State<ErrorTranslator>,
    req: Request,
    next: Next,
) -> Response {
    let res = next.run(req).await;
    if let Some(err) = res.extensions().get::<Arc<AppError>>().cloned() {
        return translator.render(&err);
    }
    res
}

/// Router fallback for paths no route matches.
pub async fn unknown_route(uri: Uri) -> AppError {
    AppError::RouteNotFound(uri.path().to_string())
}

/// Method-router fallback for a known path hit with an unsupported method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

/// Turns a handler panic into a translated 500 response.
#[derive(Debug, Clone, Copy)]
pub struct PanicResponder {
    translator: ErrorTranslator,
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = axum::body::Body;

    fn response_for_panic(&mut self, payload: Box<dyn Any + Send + 'static>) -> Response {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        let err = AppError::Core(CoreError::Repository(format!("handler panicked: {detail}")));
        self.translator.render(&err)
    }
}

pub fn catch_panics(environment: AppEnvironment) -> CatchPanicLayer<PanicResponder> {
    CatchPanicLayer::custom(PanicResponder {
        translator: ErrorTranslator::new(environment),
    })
}
