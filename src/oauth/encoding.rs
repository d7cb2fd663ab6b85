use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac as _};
use sha1::Sha1;
use sha2::Sha256;
use url::{Url, form_urlencoded};

use crate::Result;
use crate::error::Error;
use crate::oauth::SignatureMethod;
use crate::types::HttpMethod;

/// RFC 3986 percent-encoding: only `A-Z a-z 0-9 - . _ ~` stay literal.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    form_urlencoded::byte_serialize(input.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Scheme, host, non-default port and path of `url`; query and fragment
/// dropped.
pub(crate) fn base_uri(url: &Url) -> String {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.to_string()
}

/// Encodes, sorts and joins parameters into the normalized parameter string.
pub(crate) fn normalized_parameters(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn signature_base_string(
    method: HttpMethod,
    url: &Url,
    params: &[(String, String)],
) -> String {
    format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(&base_uri(url)),
        percent_encode(&normalized_parameters(params))
    )
}

fn hmac_sha1(key: &[u8]) -> Result<Hmac<Sha1>> {
    Hmac::<Sha1>::new_from_slice(key).map_err(|e| Error::internal(format!("hmac key: {e}")))
}

fn hmac_sha256(key: &[u8]) -> Result<Hmac<Sha256>> {
    Hmac::<Sha256>::new_from_slice(key).map_err(|e| Error::internal(format!("hmac key: {e}")))
}

/// Base64 MAC of `base_string` under `key`.
pub(crate) fn sign(method: SignatureMethod, key: &str, base_string: &str) -> Result<String> {
    let digest = match method {
        SignatureMethod::HmacSha1 => {
            let mut mac = hmac_sha1(key.as_bytes())?;
            mac.update(base_string.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        SignatureMethod::HmacSha256 => {
            let mut mac = hmac_sha256(key.as_bytes())?;
            mac.update(base_string.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(STANDARD.encode(digest))
}

/// Constant-time check of a base64 signature against `base_string`.
pub(crate) fn verify_signature(
    method: SignatureMethod,
    key: &str,
    base_string: &str,
    signature: &str,
) -> Result<bool> {
    let Ok(expected) = STANDARD.decode(signature) else {
        return Ok(false);
    };
    let verified = match method {
        SignatureMethod::HmacSha1 => {
            let mut mac = hmac_sha1(key.as_bytes())?;
            mac.update(base_string.as_bytes());
            mac.verify_slice(&expected).is_ok()
        }
        SignatureMethod::HmacSha256 => {
            let mut mac = hmac_sha256(key.as_bytes())?;
            mac.update(base_string.as_bytes());
            mac.verify_slice(&expected).is_ok()
        }
    };
    Ok(verified)
}
