//! The request pipeline shared by every backend-proxy route.
//!
//! A route is an [`Endpoint`]: a method, a fixed backend path and an access
//! declaration. The pipeline checks the inbound payload, attaches the
//! caller's credentials and forwarded headers, sends the call and
//! normalizes the answer. Handlers stay a few lines long.

use axum::body::Bytes;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use campus_console_core::DocumentId;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::backend::{BackendBody, BackendRequest, BackendResponse};
use crate::credentials::Inbound;
use crate::disposition::{attachment, filename_from_disposition};
use crate::error::{ProxyError, StatusMode};
use crate::routes::BffState;
use crate::schema::{self, Schema};

/// Whether an endpoint needs a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Fails with [`ProxyError::AuthAbsent`] before any network call when
    /// no token is present.
    Protected,
    /// Sent with or without credentials.
    Anonymous,
}

/// A fixed backend call.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub access: Access,
}

impl Endpoint {
    #[must_use]
    pub fn protected(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            access: Access::Protected,
        }
    }

    #[must_use]
    pub fn anonymous(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            access: Access::Anonymous,
        }
    }
}

/// Proxy behaviour settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Map failures to kind-specific statuses instead of a blanket 500.
    #[serde(default)]
    pub strict_status_codes: bool,

    /// Largest document accepted by the upload route, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            strict_status_codes: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ProxyConfig {
    #[must_use]
    pub fn status_mode(&self) -> StatusMode {
        if self.strict_status_codes {
            StatusMode::Strict
        } else {
            StatusMode::Legacy
        }
    }
}

/// Decodes and validates an inbound JSON body.
///
/// Returns the typed payload and the original value, which is what gets
/// forwarded.
pub fn decode_body<T: Schema>(body: &Bytes) -> Result<(T, serde_json::Value), ProxyError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| ProxyError::invalid("body", "Le corps de la requête n'est pas du JSON valide"))?;
    let payload = schema::parse::<T>(&value)?;
    Ok((payload, value))
}

/// Sends one call through the pipeline.
///
/// Non-success answers are turned into [`ProxyError::Backend`] with the
/// backend's JSON body attached when it has one.
pub async fn dispatch(
    state: &BffState,
    inbound: &Inbound,
    endpoint: &Endpoint,
    query: Option<String>,
    body: BackendBody,
) -> Result<BackendResponse, ProxyError> {
    if endpoint.access == Access::Protected && !inbound.access.is_authenticated() {
        return Err(ProxyError::AuthAbsent);
    }

    let request = BackendRequest {
        method: endpoint.method.clone(),
        path: endpoint.path.clone(),
        query,
        headers: inbound.outbound_headers(),
        body,
    };
    let response = state.backend.send(request).await?;

    if response.status.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let upstream = response
        .bytes(state.max_body_bytes)
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());
    Err(ProxyError::Backend { status, upstream })
}

/// Reads a successful answer as typed JSON.
pub async fn read_json<T: DeserializeOwned>(
    state: &BffState,
    response: BackendResponse,
) -> Result<T, ProxyError> {
    let bytes = response.bytes(state.max_body_bytes).await?;
    serde_json::from_slice(&bytes).map_err(|e| ProxyError::MalformedUpstream {
        details: e.to_string(),
    })
}

/// Relays a successful answer: `204` stays an empty `204`, anything else
/// must be JSON and is passed through with the backend's status.
pub async fn relay(state: &BffState, response: BackendResponse) -> Result<Response, ProxyError> {
    let status = response.status;
    if status == StatusCode::NO_CONTENT {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let bytes = response.bytes(state.max_body_bytes).await?;
    if bytes.is_empty() {
        return Ok(status.into_response());
    }
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| ProxyError::MalformedUpstream {
            details: e.to_string(),
        })?;
    Ok((status, Json(value)).into_response())
}

/// Forwards a call and relays the answer.
pub async fn pass_through(
    state: &BffState,
    inbound: &Inbound,
    endpoint: &Endpoint,
    query: Option<String>,
    body: BackendBody,
) -> Result<Response, ProxyError> {
    let response = dispatch(state, inbound, endpoint, query, body).await?;
    relay(state, response).await
}

/// Validates the body against `T`, then forwards it unchanged.
pub async fn forward_validated<T: Schema>(
    state: &BffState,
    inbound: &Inbound,
    endpoint: &Endpoint,
    body: &Bytes,
) -> Result<Response, ProxyError> {
    let (_payload, value) = decode_body::<T>(body)?;
    pass_through(state, inbound, endpoint, None, BackendBody::Json(value)).await
}

/// Forwards a multipart upload byte-for-byte, boundary included.
pub async fn upload(
    state: &BffState,
    inbound: &Inbound,
    endpoint: &Endpoint,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let content_type = inbound
        .content_type
        .clone()
        .filter(|ct| {
            ct.to_str()
                .is_ok_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
        })
        .ok_or_else(|| ProxyError::invalid("file", "Un envoi multipart est attendu"))?;
    if body.is_empty() {
        return Err(ProxyError::invalid("file", "Aucun fichier reçu"));
    }

    pass_through(
        state,
        inbound,
        endpoint,
        None,
        BackendBody::Raw {
            content_type,
            bytes: body,
        },
    )
    .await
}

/// Document metadata as returned by the backend.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMetadata {
    #[serde(default)]
    file: Option<AttachedFile>,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachedFile {
    #[serde(default)]
    name: Option<String>,
}

impl DocumentMetadata {
    /// Name of the attached file, if a file is attached.
    fn attached_name(&self) -> Option<&str> {
        self.file
            .as_ref()
            .and_then(|file| file.name.as_deref())
            .or(self.file_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }
}

/// Streams a document's file back to the browser.
///
/// The metadata is fetched first; a document with no attached file fails
/// with [`ProxyError::ResourceNotFound`] without requesting the bytes.
pub async fn download(
    state: &BffState,
    inbound: &Inbound,
    id: &DocumentId,
) -> Result<Response, ProxyError> {
    let metadata_endpoint = Endpoint::protected(Method::GET, format!("/documents/{id}"));
    let metadata: DocumentMetadata = read_json(
        state,
        dispatch(state, inbound, &metadata_endpoint, None, BackendBody::Empty).await?,
    )
    .await?;
    let fallback_name = metadata
        .attached_name()
        .ok_or_else(|| ProxyError::ResourceNotFound {
            resource: format!("file of document {id}"),
        })?
        .to_string();

    let file_endpoint = Endpoint::protected(Method::GET, format!("/documents/{id}/download"));
    let BackendResponse {
        status,
        headers: upstream,
        body,
    } = dispatch(state, inbound, &file_endpoint, None, BackendBody::Empty).await?;

    let name = upstream
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or(fallback_name);
    let content_type = upstream
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    tracing::debug!(document = %id, file = %name, "Streaming document");

    let mut relayed = Response::new(body);
    *relayed.status_mut() = status;
    let headers = relayed.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_DISPOSITION, attachment(&name));
    if let Some(length) = upstream.get(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, length.clone());
    }
    Ok(relayed)
}
