#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod error;
pub mod oauth;
pub mod params;
pub mod relay;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod types;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use url::Url;

use crate::error::Error;
use crate::types::{HttpMethod, SignedRequest};

pub type Result<T> = std::result::Result<T, Error>;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Raw response of the remote API, relayed to the caller as-is.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Points `base` at an origin-relative `path`, optionally carrying a query.
///
/// Only the host of `base` is ever addressed: absolute, scheme-relative and
/// relative paths are rejected.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url> {
    if !is_origin_path(path) {
        return Err(Error::validation(format!(
            "http_path must start with a single `/`, got `{path}`"
        )));
    }
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = base.clone();
    url.set_path(path);
    url.set_query(query);
    Ok(url)
}

/// Whether `path` starts with exactly one `/` and cannot name another host.
///
/// Fragments are refused too; the signed query is appended after the path.
pub(crate) fn is_origin_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains(['\\', '#'])
}

/// Sends a signed request to `base` in a single round trip.
///
/// Non-2xx responses are not errors: their status and body are returned for
/// pass-through. Only transport failures surface as [`Error`].
pub(crate) async fn dispatch(
    client: &ReqwestClient,
    base: &Url,
    signed: &SignedRequest,
) -> Result<RemoteResponse> {
    let url = endpoint(base, &signed.url)?;
    let method = match signed.method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
    };
    let header = HeaderValue::from_str(&signed.authorization_header)
        .map_err(|e| Error::internal(format!("invalid authorization header: {e}")))?;

    let mut builder = client.request(method, url).header(AUTHORIZATION, header);
    if let Some(body) = &signed.body {
        builder = builder
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body.clone());
    }

    let response = builder.send().await.map_err(Error::remote)?;
    let status = response.status();
    let body = response.text().await.map_err(Error::remote)?;

    #[cfg(feature = "tracing")]
    if !status.is_success() {
        tracing::warn!(
            status = %status,
            method = %signed.method,
            path = %signed.url.split('?').next().unwrap_or_default(),
            "remote API returned a non-success status"
        );
    }

    Ok(RemoteResponse { status, body })
}
