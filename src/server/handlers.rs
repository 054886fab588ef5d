use super::{
    pages,
    types::{ClassifyApiResponse, CritiqueApiResponse, ErrorResponse, HealthResponse},
};
use crate::{
    Error, ErrorKind,
    config::CritiqueConfig,
    critique::{self, CritiqueRequest, UploadedDocument},
    llm::LlmClient,
    vision::{self, LoadedClassifier},
};
use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{Html, Json},
};
use std::{path::Path, sync::Arc};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LlmClient>,
    pub critique: Arc<CritiqueConfig>,
    pub classifier: Option<LoadedClassifier>,
    pub top_k: usize,
    pub max_upload_bytes: usize,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => match err.kind() {
            ErrorKind::InputValidation => StatusCode::BAD_REQUEST,
            ErrorKind::ExternalCall => StatusCode::BAD_GATEWAY,
            ErrorKind::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn api_error(request_id: &str, err: Error) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(request_id = %request_id, kind = err.kind().as_str(), "Request failed: {}", err);
    } else {
        warn!(request_id = %request_id, kind = err.kind().as_str(), "Request rejected: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind().as_str().to_string(),
        }),
    )
}

/// Fields of an upload form: one `file` and an optional `role`.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<UploadedDocument>,
    role: Option<String>,
}

fn multipart_error(e: MultipartError, limit: usize) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit }
    } else {
        Error::InvalidRequest(e.body_text())
    }
}

async fn read_form(multipart: &mut Multipart, limit: usize) -> Result<UploadForm, Error> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let media_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                if bytes.len() > limit {
                    return Err(Error::PayloadTooLarge { limit });
                }
                form.file = Some(UploadedDocument::new(file_name, media_type, bytes.to_vec()));
            }
            Some("role") => {
                let role = field.text().await.map_err(|e| multipart_error(e, limit))?;
                form.role = Some(role);
            }
            _ => {}
        }
    }

    Ok(form)
}

fn required_file(form: &mut UploadForm) -> Result<UploadedDocument, Error> {
    form.file
        .take()
        .ok_or_else(|| Error::InvalidRequest("multipart field 'file' is required".to_string()))
}

fn ensure_image_upload(upload: &UploadedDocument) -> Result<(), Error> {
    let media_type = upload.media_type.split(';').next().unwrap_or_default().trim();
    if matches!(media_type, "image/jpeg" | "image/jpg" | "image/png") {
        return Ok(());
    }
    let extension = upload
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg" | "png") => Ok(()),
        _ => Err(Error::UnsupportedMediaType(format!(
            "'{}'; upload a JPG or PNG image",
            upload.file_name.as_deref().unwrap_or("upload")
        ))),
    }
}

pub async fn index() -> Html<&'static str> {
    Html(pages::INDEX_HTML)
}

pub async fn critique_page() -> Html<&'static str> {
    Html(pages::CRITIQUE_HTML)
}

pub async fn classify_page() -> Html<&'static str> {
    Html(pages::CLASSIFY_HTML)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        classifier: state.classifier.is_some(),
    })
}

pub async fn critique(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CritiqueApiResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    let mut form = read_form(&mut multipart, state.max_upload_bytes)
        .await
        .map_err(|e| api_error(&request_id, e))?;
    let document = required_file(&mut form).map_err(|e| api_error(&request_id, e))?;

    info!(
        request_id = %request_id,
        file_name = document.file_name.as_deref().unwrap_or("-"),
        size = document.bytes.len(),
        "Received resume for critique"
    );

    let request = CritiqueRequest {
        document,
        target_role: form.role,
    };
    let prompt = tokio::task::spawn_blocking(move || critique::prepare(&request))
        .await
        .map_err(|e| Error::internal(format!("document extraction panicked: {e}")))
        .and_then(|prepared| prepared)
        .map_err(|e| api_error(&request_id, e))?;

    let response = critique::critique(prompt, state.llm.as_ref(), &state.critique)
        .await
        .map_err(|e| api_error(&request_id, e))?;

    info!(request_id = %request_id, "Critique completed");
    Ok(Json(CritiqueApiResponse {
        request_id,
        target_role: response.target_role,
        feedback: response.feedback,
    }))
}

pub async fn classify(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ClassifyApiResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    let Some(classifier) = state.classifier.clone() else {
        return Err(api_error(
            &request_id,
            Error::config("image classifier is not configured on this server"),
        ));
    };

    let mut form = read_form(&mut multipart, state.max_upload_bytes)
        .await
        .map_err(|e| api_error(&request_id, e))?;
    let upload = required_file(&mut form).map_err(|e| api_error(&request_id, e))?;
    ensure_image_upload(&upload).map_err(|e| api_error(&request_id, e))?;

    info!(request_id = %request_id, size = upload.bytes.len(), "Received image for classification");

    let top_k = state.top_k;
    let predictions = tokio::task::spawn_blocking(move || {
        vision::classify_image(
            classifier.model.as_ref(),
            &classifier.labels,
            &upload.bytes,
            top_k,
        )
    })
    .await
    .map_err(|e| Error::internal(format!("classifier panicked: {e}")))
    .and_then(|classified| classified)
    .map_err(|e| api_error(&request_id, e))?;

    Ok(Json(ClassifyApiResponse {
        request_id,
        predictions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::EmptyDocument, StatusCode::BAD_REQUEST)]
    #[case(Error::UnsupportedMediaType("x".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE)]
    #[case(Error::PayloadTooLarge { limit: 10 }, StatusCode::PAYLOAD_TOO_LARGE)]
    #[case(Error::llm("down"), StatusCode::BAD_GATEWAY)]
    #[case(Error::config("no model"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(Error::internal("bug"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_errors_to_status(#[case] err: Error, #[case] expected: StatusCode) {
        assert_eq!(status_for(&err), expected);
    }

    #[rstest]
    #[case("image/png", None, true)]
    #[case("application/octet-stream", Some("cat.JPG"), true)]
    #[case("image/gif", Some("cat.gif"), false)]
    #[case("", None, false)]
    fn accepts_only_jpeg_and_png(
        #[case] media_type: &str,
        #[case] name: Option<&str>,
        #[case] accepted: bool,
    ) {
        let upload = UploadedDocument::new(name.map(str::to_string), media_type, vec![1]);
        assert_eq!(ensure_image_upload(&upload).is_ok(), accepted);
    }
}
