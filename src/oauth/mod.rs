//! OAuth 1.0 consumer request signing.
//!
//! Only the consumer half of the protocol is implemented: requests are signed
//! with the client id and secret, and the token secret is always empty.

mod encoding;
mod signer;
mod verify;

use std::str::FromStr;

use secrecy::{ExposeSecret as _, SecretString};
use strum_macros::{Display, IntoStaticStr};
use url::Url;

pub use encoding::percent_encode;
pub use signer::{SignOverrides, Signer};
pub use verify::verify;

use crate::Result;
use crate::error::Error;

pub const OAUTH_VERSION: &str = "1.0";

/// Shared client credentials for the remote API.
#[derive(Clone, Debug)]
pub struct Credentials {
    client_id: String,
    secret: SecretString,
    base_url: Url,
}

impl Credentials {
    /// Fails when `base_url` is not an absolute `http`/`https` URL.
    pub fn new<S: Into<String>>(client_id: S, secret: SecretString, base_url: Url) -> Result<Self> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(Error::validation(format!(
                "base url must be an absolute http(s) url, got `{base_url}`"
            )));
        }
        Ok(Self {
            client_id: client_id.into(),
            secret,
            base_url,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Key for the HMAC: encoded consumer secret followed by `&` and the
    /// (empty) token secret.
    pub(crate) fn signing_key(&self) -> String {
        format!("{}&", percent_encode(self.secret.expose_secret()))
    }
}

/// Supported `oauth_signature_method` values.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Display, IntoStaticStr, PartialEq, Eq)]
pub enum SignatureMethod {
    #[default]
    #[strum(serialize = "HMAC-SHA1")]
    HmacSha1,
    #[strum(serialize = "HMAC-SHA256")]
    HmacSha256,
}

impl SignatureMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl FromStr for SignatureMethod {
    type Err = Error;

    /// Accepts `HMAC-SHA1` / `HMAC-SHA256` in any case, with or without the
    /// dash, as found in host configuration.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "hmac-sha1" | "hmacsha1" => Ok(SignatureMethod::HmacSha1),
            "hmac-sha256" | "hmacsha256" => Ok(SignatureMethod::HmacSha256),
            other => Err(Error::validation(format!(
                "invalid signature method `{other}`; expected one of: hmac-sha1|hmac-sha256"
            ))),
        }
    }
}
