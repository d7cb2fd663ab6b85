//! Collaborators the relay depends on: per-account integration settings,
//! course permission checks and course lookup.
//!
//! Hosts implement these traits over their own storage and permission model.
//! The `Memory*` implementations keep everything in process and are meant for
//! tests and local development.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use secrecy::SecretString;
use url::Url;

use crate::Result;
use crate::error::Error;
use crate::oauth::Credentials;
use crate::types::{Course, Rights, Subject};

/// Integration settings stored for an account.
///
/// The secret is the decrypted value; encryption at rest is the store's
/// concern.
#[non_exhaustive]
#[derive(Clone, Debug, Default)]
pub struct IntegrationSettings {
    pub enabled: bool,
    pub client_id: Option<String>,
    pub secret: Option<SecretString>,
    /// Base URL exactly as configured; parsed when credentials are built.
    pub base_url: Option<String>,
}

impl IntegrationSettings {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enabled settings; `base_url` must be an absolute http(s) URL.
    pub fn configured<C: Into<String>>(
        client_id: C,
        secret: SecretString,
        base_url: &str,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "base url must use http or https, got `{base_url}`"
            )));
        }
        Ok(Self {
            enabled: true,
            client_id: Some(client_id.into()),
            secret: Some(secret),
            base_url: Some(base_url.to_owned()),
        })
    }

    /// Credentials for signing, or `NotEnabled` when the integration is off
    /// or only partially configured.
    pub fn credentials(&self) -> Result<Credentials> {
        if !self.enabled {
            return Err(Error::not_enabled());
        }
        match (&self.client_id, &self.secret, &self.base_url) {
            (Some(client_id), Some(secret), Some(base_url)) => {
                Credentials::new(client_id.clone(), secret.clone(), Url::parse(base_url)?)
            }
            _ => Err(Error::not_enabled()),
        }
    }
}

#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Settings for `account_id`. Unknown accounts yield disabled settings.
    async fn get(&self, account_id: &str) -> Result<IntegrationSettings>;
}

#[async_trait]
pub trait AuthorizationCheck: Send + Sync {
    /// Whether `subject` (or an anonymous caller when `None`) holds at least
    /// one of `rights` on `course`.
    async fn has_any_right(
        &self,
        subject: Option<&Subject>,
        course: &Course,
        rights: Rights,
    ) -> Result<bool>;
}

#[async_trait]
pub trait CourseDirectory: Send + Sync {
    async fn find(&self, course_id: &str) -> Result<Option<Course>>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryConfigurationStore {
    settings: Arc<DashMap<String, IntegrationSettings>>,
}

impl MemoryConfigurationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&self, account_id: S, settings: IntegrationSettings) {
        self.settings.insert(account_id.into(), settings);
    }
}

#[async_trait]
impl ConfigurationStore for MemoryConfigurationStore {
    async fn get(&self, account_id: &str) -> Result<IntegrationSettings> {
        Ok(self
            .settings
            .get(account_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// Grants rights per user and course, plus public rights that apply to every
/// caller including anonymous ones.
#[derive(Clone, Debug, Default)]
pub struct MemoryAuthorization {
    grants: Arc<DashMap<(String, String), Rights>>,
    public: Arc<DashMap<String, Rights>>,
}

impl MemoryAuthorization {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, subject: &Subject, course_id: &str, rights: Rights) {
        self.grants
            .entry((subject.id.clone(), course_id.to_owned()))
            .and_modify(|held| *held |= rights)
            .or_insert(rights);
    }

    pub fn grant_public(&self, course_id: &str, rights: Rights) {
        self.public
            .entry(course_id.to_owned())
            .and_modify(|held| *held |= rights)
            .or_insert(rights);
    }

    fn held(&self, subject: Option<&Subject>, course_id: &str) -> Rights {
        let public = self
            .public
            .get(course_id)
            .map_or(Rights::empty(), |entry| *entry.value());
        let personal = subject
            .and_then(|s| self.grants.get(&(s.id.clone(), course_id.to_owned())))
            .map_or(Rights::empty(), |entry| *entry.value());
        public | personal
    }
}

#[async_trait]
impl AuthorizationCheck for MemoryAuthorization {
    async fn has_any_right(
        &self,
        subject: Option<&Subject>,
        course: &Course,
        rights: Rights,
    ) -> Result<bool> {
        Ok(self.held(subject, &course.id).intersects(rights))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCourseDirectory {
    courses: Arc<DashMap<String, Course>>,
}

impl MemoryCourseDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, course: Course) {
        self.courses.insert(course.id.clone(), course);
    }
}

#[async_trait]
impl CourseDirectory for MemoryCourseDirectory {
    async fn find(&self, course_id: &str) -> Result<Option<Course>> {
        Ok(self.courses.get(course_id).map(|entry| entry.value().clone()))
    }
}
