use std::collections::BTreeMap;

use url::{Url, form_urlencoded};

use crate::Result;
use crate::error::Error;
use crate::oauth::encoding::{signature_base_string, verify_signature};
use crate::oauth::{Credentials, OAUTH_VERSION, SignatureMethod};
use crate::types::HttpMethod;

/// Checks an `Authorization: OAuth ...` header against a received request.
///
/// `url` is the absolute request URL including its query string. Form body
/// parameters of `POST` requests are not part of the signature.
///
/// Returns `Ok(false)` when the signature, consumer key or version do not
/// match, and an error when the header cannot be parsed at all.
pub fn verify(
    credentials: &Credentials,
    method: HttpMethod,
    url: &Url,
    authorization_header: &str,
) -> Result<bool> {
    let fields = parse_header(authorization_header)?;

    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| Error::validation(format!("authorization header is missing `{name}`")))
    };

    if field("oauth_consumer_key")? != credentials.client_id() {
        return Ok(false);
    }
    if fields
        .get("oauth_version")
        .is_some_and(|version| version != OAUTH_VERSION)
    {
        return Ok(false);
    }
    let signature_method: SignatureMethod = field("oauth_signature_method")?
        .parse()
        .map_err(|_e| Error::validation("unsupported oauth_signature_method"))?;
    let signature = field("oauth_signature")?;

    let mut params: Vec<(String, String)> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "oauth_signature" && k.as_str() != "realm")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    params.extend(url.query_pairs().into_owned());

    let base_string = signature_base_string(method, url, &params);
    verify_signature(
        signature_method,
        &credentials.signing_key(),
        &base_string,
        signature,
    )
}

fn parse_header(header: &str) -> Result<BTreeMap<String, String>> {
    let rest = header
        .trim()
        .strip_prefix("OAuth ")
        .ok_or_else(|| Error::validation("authorization header must use the OAuth scheme"))?;

    let mut fields = BTreeMap::new();
    for part in rest.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| Error::validation(format!("malformed authorization field `{part}`")))?;
        let value = value.trim().trim_matches('"');
        fields.insert(key.trim().to_owned(), percent_decode(value));
    }
    Ok(fields)
}

fn percent_decode(value: &str) -> String {
    let escaped = format!("v={}", value.replace('+', "%2B"));
    form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
