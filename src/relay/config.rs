use std::time::Duration;

use bon::Builder;

use crate::Result;
use crate::error::Error;
use crate::oauth::SignatureMethod;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_USER_AGENT: &str = concat!("ally-relay/", env!("CARGO_PKG_VERSION"));

/// Raw relay values typically read from host configuration files or the
/// environment. Unset values fall back to the defaults.
#[derive(Clone, Debug, Default)]
pub struct RawRelayConfig {
    pub timeout_secs: Option<String>,
    pub signature_method: Option<String>,
    pub user_agent: Option<String>,
}

/// Relay configuration shared by every request.
#[derive(Clone, Debug, Builder)]
pub struct RelayConfig {
    /// Upper bound for the round trip to the remote API.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default)]
    pub signature_method: SignatureMethod,
    #[builder(default = DEFAULT_USER_AGENT.to_owned())]
    pub user_agent: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RelayConfig {
    pub fn from_raw(raw: RawRelayConfig) -> Result<Self> {
        let timeout = match raw.timeout_secs.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_TIMEOUT,
            Some(value) => {
                let secs: u64 = value
                    .parse()
                    .map_err(|e| Error::validation(format!("invalid timeout `{value}`: {e}")))?;
                Duration::from_secs(secs)
            }
        };
        let signature_method = match raw.signature_method.as_deref() {
            None => SignatureMethod::default(),
            Some(value) => value.parse()?,
        };

        let config = Self {
            timeout,
            signature_method,
            user_agent: raw
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::validation("relay timeout must be greater than zero"));
        }
        Ok(())
    }
}
