use crate::http::pages::{setup_page, Banner};
use axum::extract::{Form, FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct SuccessfulResponse<T> {
    pub success: bool,
    pub response: T,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub struct HttpSuccess<T>(pub T);
impl<T: Serialize> IntoResponse for HttpSuccess<T> {
    fn into_response(self) -> Response {
        Json(SuccessfulResponse {
            success: true,
            response: self.0,
        })
        .into_response()
    }
}

#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                success: false,
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type HttpResult<T> = Result<HttpSuccess<T>, HttpError>;

#[derive(Deserialize)]
pub struct SetLogLevelRequest {
    pub level: String,
}

#[derive(Serialize)]
pub struct SetupResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Body of `POST /setup`, accepted under either `key` or `GEMINI_API_KEY`.
#[derive(Debug, Default, Deserialize)]
pub struct SetupRequest {
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default, rename = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,
}
impl SetupRequest {
    pub fn submitted_key(self) -> Option<String> {
        self.key
            .filter(|key| !key.is_empty())
            .or(self.gemini_api_key)
    }
}

/// How the key was submitted, which decides how the answer is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFormat {
    Json,
    Form,
}
impl SubmissionFormat {
    pub fn success(self, response: SetupResponse) -> Response {
        match self {
            Self::Json => HttpSuccess(response).into_response(),
            Self::Form => {
                let page = setup_page(Some(Banner::Success(response.message)));
                Html(page).into_response()
            }
        }
    }

    pub fn error(self, status: StatusCode, message: String) -> Response {
        match self {
            Self::Json => HttpError { status, message }.into_response(),
            Self::Form => {
                let page = setup_page(Some(Banner::Error(&message)));
                (status, Html(page)).into_response()
            }
        }
    }
}

/// Extracts a [`SetupRequest`] from either a JSON or a form encoded body.
pub struct SetupSubmission {
    pub request: SetupRequest,
    pub format: SubmissionFormat,
}
impl<S> FromRequest<S> for SetupSubmission
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let reject = |message: String| HttpError {
            status: StatusCode::BAD_REQUEST,
            message,
        };

        if is_json {
            let Json(request) = Json::<SetupRequest>::from_request(req, state)
                .await
                .map_err(|e| reject(e.body_text()))?;
            Ok(Self {
                request,
                format: SubmissionFormat::Json,
            })
        } else {
            let Form(request) = Form::<SetupRequest>::from_request(req, state)
                .await
                .map_err(|e| reject(e.body_text()))?;
            Ok(Self {
                request,
                format: SubmissionFormat::Form,
            })
        }
    }
}
