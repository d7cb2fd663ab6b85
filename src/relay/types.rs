use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::RemoteResponse;

/// Query parameters of the `sign` and `proxy` operations, as received.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SignParams {
    pub http_method: Option<String>,
    pub http_path: Option<String>,
    /// URL-encoded query string of application parameters.
    pub http_parameters: Option<String>,
}

impl SignParams {
    #[must_use]
    pub fn new(method: &str, path: &str, parameters: &str) -> Self {
        Self {
            http_method: Some(method.to_owned()),
            http_path: Some(path.to_owned()),
            http_parameters: Some(parameters.to_owned()),
        }
    }
}

/// Payload of the `enabled` operation.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnabledResponse {
    pub enabled: bool,
    pub client_id: Option<String>,
    pub base_url: Option<String>,
}

/// Payload of the `sign` operation: everything the browser needs to call the
/// remote API itself.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    pub client_id: String,
    pub base_url: String,
    /// Request path; for `GET` it includes the signed query string.
    pub path: String,
    /// Value of the `Authorization` header.
    pub header: String,
    /// Form-encoded body for `POST`, `None` for `GET`.
    pub body: Option<String>,
}

/// How a relayed body should be labelled to the caller.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyContent {
    Json,
    Text,
}

/// Remote response relayed by the `proxy` operation.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: String,
    pub content: ProxyContent,
}

impl From<RemoteResponse> for ProxyResponse {
    /// `200` and `201` bodies are relayed as JSON, everything else verbatim
    /// as text.
    fn from(remote: RemoteResponse) -> Self {
        let content = match remote.status {
            StatusCode::OK | StatusCode::CREATED => ProxyContent::Json,
            _ => ProxyContent::Text,
        };
        Self {
            status: remote.status,
            body: remote.body,
            content,
        }
    }
}
