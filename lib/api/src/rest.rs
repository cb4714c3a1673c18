use crate::config::ServerConfig;
use crate::service::QueryService;
use actix_cors::Cors;
use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError, Result as ActixResult};
use bytes::BytesMut;
use futures_util::StreamExt;
use imgsim_core::Error;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Largest accepted upload, in bytes
#[derive(Debug, Clone, Copy)]
struct UploadLimit(usize);

pub struct RestApi;

impl RestApi {
    pub async fn start(service: Arc<QueryService>, config: &ServerConfig) -> std::io::Result<()> {
        let max_upload = config.max_upload_bytes;
        info!("Listening on {}:{}", config.host, config.http_port);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .configure(configure(service.clone(), max_upload))
        })
        .bind((config.host.as_str(), config.http_port))?
        .run()
        .await
    }
}

/// Register state and routes. The collection is exposed under `/dataset` when it exists.
pub fn configure(
    service: Arc<QueryService>,
    max_upload_bytes: usize,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let dataset_dir = service.dataset_dir().to_path_buf();

        cfg.app_data(web::Data::new(service))
            .app_data(web::Data::new(UploadLimit(max_upload_bytes)))
            .route("/compare-image/", web::post().to(compare_image))
            .route("/compare-image", web::post().to(compare_image))
            .route("/status", web::get().to(status))
            .route("/reindex", web::post().to(reindex))
            .route("/healthz", web::get().to(healthz));

        if dataset_dir.is_dir() {
            cfg.service(Files::new("/dataset", dataset_dir));
        }
    }
}

/// Service errors rendered as `{"error": ...}` JSON
#[derive(Debug)]
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            Error::UnsupportedImage(_) | Error::EmptyIndex => StatusCode::BAD_REQUEST,
            Error::RebuildInProgress => StatusCode::CONFLICT,
            Error::Timeout(_) | Error::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        if code.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        HttpResponse::build(code).json(serde_json::json!({
            "error": self.0.to_string()
        }))
    }
}

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": message.into()
    }))
}

/// Pull the `file` field out of a multipart body
async fn read_upload(
    mut payload: Multipart,
    limit: usize,
) -> Result<(String, BytesMut), HttpResponse> {
    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| bad_request(format!("Malformed upload: {}", e)))?;

        if field.name() != Some("file") {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| bad_request(format!("Malformed upload: {}", e)))?;
            }
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("upload")
            .to_string();

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| bad_request(format!("Malformed upload: {}", e)))?;
            if data.len() + chunk.len() > limit {
                return Err(HttpResponse::PayloadTooLarge().json(serde_json::json!({
                    "error": format!("Upload exceeds {} bytes", limit)
                })));
            }
            data.extend_from_slice(&chunk);
        }
        return Ok((filename, data));
    }

    Err(bad_request("Missing multipart field 'file'"))
}

async fn compare_image(
    service: web::Data<Arc<QueryService>>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let (filename, data) = match read_upload(payload, limit.0).await {
        Ok(upload) => upload,
        Err(response) => return Ok(response),
    };

    let outcome = service.compare(filename, data.freeze()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

async fn status(service: web::Data<Arc<QueryService>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.status()))
}

async fn reindex(service: web::Data<Arc<QueryService>>) -> Result<HttpResponse, ApiError> {
    let status = service.rebuild().await?;
    Ok(HttpResponse::Ok().json(status))
}

async fn healthz() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok"
    })))
}
