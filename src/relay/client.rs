use std::sync::Arc;

use reqwest::Client as ReqwestClient;

use crate::error::{Error, Kind as ErrorKind};
use crate::oauth::{Credentials, Signer};
use crate::params::ParameterSet;
use crate::relay::policy;
use crate::relay::{EnabledResponse, ProxyResponse, RelayConfig, SignParams, SignResponse};
use crate::store::{AuthorizationCheck, ConfigurationStore, IntegrationSettings};
use crate::types::{CallerId, Course, HttpMethod, Role, SignedRequest, SigningContext, Subject};
use crate::{Result, dispatch, is_origin_path};

/// Signs requests for the remote API and relays them on behalf of callers.
///
/// Holds no per-request state; share one instance behind an [`Arc`].
#[derive(Clone)]
pub struct Relay {
    store: Arc<dyn ConfigurationStore>,
    authorization: Arc<dyn AuthorizationCheck>,
    config: RelayConfig,
    client: ReqwestClient,
}

/// Outcome of the validation and signing steps shared by `sign` and `proxy`.
struct Prepared {
    settings: IntegrationSettings,
    credentials: Credentials,
    signed: SignedRequest,
}

impl Relay {
    /// Creates a relay with an HTTP client honoring the configured timeout.
    ///
    /// The client never follows redirects, so a remote `3xx` is relayed as is.
    pub fn new(
        store: Arc<dyn ConfigurationStore>,
        authorization: Arc<dyn AuthorizationCheck>,
        config: RelayConfig,
    ) -> Result<Self> {
        config.validate()?;
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Internal, e))?;
        Ok(Self::with_client(store, authorization, config, client))
    }

    /// Creates a relay around a caller-supplied HTTP client.
    ///
    /// The client should be built with `redirect::Policy::none()`; otherwise a
    /// remote redirect is followed and the signed request leaves the single
    /// round trip.
    #[must_use]
    pub fn with_client(
        store: Arc<dyn ConfigurationStore>,
        authorization: Arc<dyn AuthorizationCheck>,
        config: RelayConfig,
        client: ReqwestClient,
    ) -> Self {
        Self {
            store,
            authorization,
            config,
            client,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Reports whether the integration is enabled for `account_id`.
    ///
    /// Client id and base URL are only exposed when it is. Only the stored
    /// flag is consulted: a partially configured account reports `true` here
    /// while `sign` and `proxy` still fail with `NotEnabled`.
    pub async fn enabled(&self, account_id: &str) -> Result<EnabledResponse> {
        let settings = self.store.get(account_id).await?;
        if !settings.enabled {
            return Ok(EnabledResponse {
                enabled: false,
                client_id: None,
                base_url: None,
            });
        }
        Ok(EnabledResponse {
            enabled: true,
            client_id: settings.client_id,
            base_url: settings.base_url,
        })
    }

    /// Role of `subject` in `course`, `None` when it has no access.
    pub async fn resolve_role(
        &self,
        subject: Option<&Subject>,
        course: &Course,
    ) -> Result<Option<Role>> {
        policy::resolve_role(self.authorization.as_ref(), subject, course).await
    }

    /// Returns the signing metadata for a request without sending it.
    pub async fn sign(
        &self,
        subject: Option<&Subject>,
        course: &Course,
        params: &SignParams,
    ) -> Result<SignResponse> {
        let Prepared {
            settings,
            credentials,
            signed,
        } = self.prepare(subject, course, params).await?;

        Ok(SignResponse {
            client_id: credentials.client_id().to_owned(),
            base_url: settings
                .base_url
                .unwrap_or_else(|| credentials.base_url().to_string()),
            path: signed.url,
            header: signed.authorization_header,
            body: signed.body,
        })
    }

    /// Signs the request, sends it to the remote API and relays the answer.
    ///
    /// A non-success remote status is relayed, not returned as an error.
    /// Dropping the returned future cancels the outbound request.
    pub async fn proxy(
        &self,
        subject: Option<&Subject>,
        course: &Course,
        params: &SignParams,
    ) -> Result<ProxyResponse> {
        let Prepared {
            credentials,
            signed,
            ..
        } = self.prepare(subject, course, params).await?;

        match dispatch(&self.client, credentials.base_url(), &signed).await {
            Ok(remote) => Ok(ProxyResponse::from(remote)),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, course_id = %course.id, "remote API request failed");
                Err(err)
            }
        }
    }

    async fn prepare(
        &self,
        subject: Option<&Subject>,
        course: &Course,
        params: &SignParams,
    ) -> Result<Prepared> {
        let settings = self.store.get(&course.account_id).await?;
        let credentials = settings.credentials()?;

        let Some(role) = self.resolve_role(subject, course).await? else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                course_id = %course.id,
                anonymous = subject.is_none(),
                "caller has no role in course"
            );
            return Err(Error::unauthorized());
        };

        let (method, path, parameters) = validate(params)?;

        let context = SigningContext::new(course.id.clone(), CallerId::from_subject(subject), role);
        let signed = Signer::new(credentials.clone())
            .with_signature_method(self.config.signature_method)
            .sign(&context, method.as_str(), path, parameters)?;

        Ok(Prepared {
            settings,
            credentials,
            signed,
        })
    }
}

fn validate(params: &SignParams) -> Result<(HttpMethod, &str, ParameterSet)> {
    let method = params
        .http_method
        .as_deref()
        .and_then(|m| HttpMethod::parse(m).ok())
        .ok_or_else(Error::method_not_allowed)?;

    let (Some(path), Some(parameters)) = (&params.http_path, &params.http_parameters) else {
        return Err(Error::missing_parameters());
    };
    if !is_origin_path(path) {
        return Err(Error::validation("http_path must be an absolute path on the Ally host"));
    }

    Ok((method, path.as_str(), ParameterSet::parse_query(parameters)?))
}
