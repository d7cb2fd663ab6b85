use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use strum_macros::{Display, IntoStaticStr};

use crate::Result;
use crate::error::Error;

/// Literal sent as `userId` when no authenticated caller exists.
pub const ANONYMOUS_USER_ID: &str = "allowed_anonymous";

/// HTTP methods accepted by the remote API.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, IntoStaticStr, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "POST")]
    Post,
}

impl HttpMethod {
    /// Parses an exact, case-sensitive `GET` or `POST`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            other => Err(Error::invalid_method(other)),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Permission tier of a caller within a course, as the remote API knows it.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, IntoStaticStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    CourseManager,
    Student,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        HttpMethod::parse(s)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "course-manager" => Ok(Role::CourseManager),
            "student" => Ok(Role::Student),
            other => Err(Error::validation(format!("unknown role `{other}`"))),
        }
    }
}

/// Identity written into the `userId` parameter.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallerId {
    User(String),
    Anonymous,
}

impl CallerId {
    #[must_use]
    pub fn from_subject(subject: Option<&Subject>) -> Self {
        subject.map_or(CallerId::Anonymous, |s| CallerId::User(s.id.clone()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            CallerId::User(id) => id,
            CallerId::Anonymous => ANONYMOUS_USER_ID,
        }
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust context injected into every signed request.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningContext {
    pub course_id: String,
    pub user_id: CallerId,
    pub role: Role,
}

impl SigningContext {
    pub fn new<S: Into<String>>(course_id: S, user_id: CallerId, role: Role) -> Self {
        Self {
            course_id: course_id.into(),
            user_id,
            role,
        }
    }
}

/// A request ready to be handed to the browser or dispatched.
///
/// `url` is relative to the integration base URL: for `GET` it carries the
/// query string, for `POST` it is the bare path and the parameters live in
/// `body`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub authorization_header: String,
    pub body: Option<String>,
}

/// Authenticated caller, as established by the host's authentication layer.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subject {
    pub id: String,
}

impl Subject {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into() }
    }
}

/// Course the request is made for, and the account owning its settings.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Course {
    pub id: String,
    pub account_id: String,
}

impl Course {
    pub fn new<I: Into<String>, A: Into<String>>(id: I, account_id: A) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
        }
    }
}

bitflags! {
    /// Course rights a caller may hold.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Rights: u8 {
        const READ = 1;
        const CREATE = 1 << 1;
        const UPDATE = 1 << 2;
    }
}
