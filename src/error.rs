use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

/// Category of an [`Error`], used to pick the status surfaced to callers.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// The integration is not configured or not enabled for the account.
    NotEnabled,
    /// The caller holds no role in the course.
    Unauthorized,
    /// `http_method` was absent or outside `GET`/`POST`.
    MethodNotAllowed,
    /// `http_path` or `http_parameters` was absent.
    MissingParameters,
    /// The signer was handed a method other than `GET`/`POST`. The relay
    /// validates methods first, so seeing this past it is a bug.
    InvalidMethod,
    /// Transport-level failure talking to the remote API.
    RemoteRequestFailed,
    /// The course does not exist.
    NotFound,
    /// Malformed input: bad URL, conflicting nested parameters, bad config.
    Validation,
    /// Collaborator or other internal failure.
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    /// Short human-readable message suitable for an HTTP response body.
    #[must_use]
    pub fn message(&self) -> String {
        match self.kind {
            Kind::NotEnabled => "Ally has not been enabled yet".to_owned(),
            Kind::Unauthorized => "user not authorized to perform that action".to_owned(),
            Kind::MethodNotAllowed => {
                "The provided http_method needs to be 'GET' or 'POST'".to_owned()
            }
            Kind::MissingParameters => {
                "The http_path and http_parameters need to be provided".to_owned()
            }
            Kind::NotFound => "The specified resource does not exist".to_owned(),
            Kind::RemoteRequestFailed => "The Ally API could not be reached".to_owned(),
            Kind::Validation => self
                .downcast_ref::<Validation>()
                .map_or_else(|| "Invalid request".to_owned(), |v| v.reason.clone()),
            Kind::InvalidMethod | Kind::Internal => "An internal error occurred".to_owned(),
        }
    }

    pub fn validation<S: Into<String>>(reason: S) -> Self {
        Validation {
            reason: reason.into(),
        }
        .into()
    }

    pub fn internal<S: Into<String>>(reason: S) -> Self {
        Self::with_source(Kind::Internal, Internal { reason: reason.into() })
    }

    pub fn remote<S: StdError + Send + Sync + 'static>(source: S) -> Self {
        Self::with_source(Kind::RemoteRequestFailed, source)
    }

    pub fn invalid_method<S: Into<String>>(method: S) -> Self {
        Self::with_source(
            Kind::InvalidMethod,
            InvalidMethod {
                method: method.into(),
            },
        )
    }

    #[must_use]
    pub fn not_enabled() -> Self {
        Self::new(Kind::NotEnabled)
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(Kind::Unauthorized)
    }

    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(Kind::MethodNotAllowed)
    }

    #[must_use]
    pub fn missing_parameters() -> Self {
        Self::new(Kind::MissingParameters)
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(Kind::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Internal {
    pub reason: String,
}

impl fmt::Display for Internal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl StdError for Internal {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMethod {
    pub method: String,
}

impl fmt::Display for InvalidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method needs to be GET or POST, got `{}`", self.method)
    }
}

impl StdError for InvalidMethod {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::remote(e)
    }
}
