use chrono::Utc;
use rand::Rng as _;
use rand::distr::Alphanumeric;

use crate::oauth::encoding::{percent_encode, sign, signature_base_string};
use crate::oauth::{Credentials, OAUTH_VERSION, SignatureMethod};
use crate::params::ParameterSet;
use crate::types::{HttpMethod, SignedRequest, SigningContext};
use crate::{Result, Timestamp, endpoint};

const NONCE_LEN: usize = 32;

/// Values pinned for a single signature instead of the fresh defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignOverrides {
    pub timestamp: Option<Timestamp>,
    pub nonce: Option<String>,
}

impl SignOverrides {
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_nonce<S: Into<String>>(mut self, nonce: S) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// Builds OAuth 1.0 signed requests for one set of credentials.
#[derive(Clone, Debug)]
pub struct Signer {
    credentials: Credentials,
    signature_method: SignatureMethod,
}

impl Signer {
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            signature_method: SignatureMethod::default(),
        }
    }

    #[must_use]
    pub fn with_signature_method(mut self, signature_method: SignatureMethod) -> Self {
        self.signature_method = signature_method;
        self
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Signs a request to `path` on behalf of `context`.
    ///
    /// `method` must be exactly `GET` or `POST`; anything else fails with
    /// [`Kind::InvalidMethod`](crate::error::Kind::InvalidMethod) before any
    /// signing work happens.
    pub fn sign(
        &self,
        context: &SigningContext,
        method: &str,
        path: &str,
        parameters: ParameterSet,
    ) -> Result<SignedRequest> {
        self.sign_with_overrides(context, method, path, parameters, SignOverrides::default())
    }

    pub fn sign_with_overrides(
        &self,
        context: &SigningContext,
        method: &str,
        path: &str,
        mut parameters: ParameterSet,
        overrides: SignOverrides,
    ) -> Result<SignedRequest> {
        let method = HttpMethod::parse(method)?;

        parameters.insert("userId", context.user_id.as_str());
        parameters.insert("courseId", context.course_id.as_str());
        parameters.insert("role", context.role.as_str());

        let target = endpoint(self.credentials.base_url(), path)?;
        let timestamp = overrides.timestamp.unwrap_or_else(|| Utc::now().timestamp());
        let nonce = overrides.nonce.unwrap_or_else(generate_nonce);

        let protocol = [
            ("oauth_consumer_key", self.credentials.client_id().to_owned()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", self.signature_method.as_str().to_owned()),
            ("oauth_timestamp", timestamp.to_string()),
            ("oauth_version", OAUTH_VERSION.to_owned()),
        ];

        let application = parameters.pairs();
        let mut signed_params: Vec<(String, String)> = protocol
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect();
        signed_params.extend(target.query_pairs().into_owned());
        if method == HttpMethod::Get {
            signed_params.extend(application.iter().cloned());
        }

        let base_string = signature_base_string(method, &target, &signed_params);
        let signature = sign(
            self.signature_method,
            &self.credentials.signing_key(),
            &base_string,
        )?;

        let authorization_header = authorization_header(&protocol, &signature);
        let query = parameters.to_query();

        let (url, body) = match method {
            HttpMethod::Get => {
                let separator = if path.contains('?') { '&' } else { '?' };
                (format!("{path}{separator}{query}"), None)
            }
            HttpMethod::Post => (path.to_owned(), Some(query)),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %method,
            path = %path,
            course_id = %context.course_id,
            role = %context.role,
            "signed remote API request"
        );

        Ok(SignedRequest {
            method,
            url,
            authorization_header,
            body,
        })
    }
}

fn authorization_header(protocol: &[(&str, String)], signature: &str) -> String {
    let mut fields: Vec<(&str, &str)> = protocol.iter().map(|(k, v)| (*k, v.as_str())).collect();
    fields.push(("oauth_signature", signature));
    fields.sort_unstable();

    let rendered = fields
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {rendered}")
}

fn generate_nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
