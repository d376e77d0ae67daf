//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer.
/// The `source` field holds the original error that caused the domain error, if any.
/// Ultimately the various `error_kind`s are used by `web` to return appropriate
/// HTTP status codes and messages to the client.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Auth(AuthErrorKind),
    Entity(EntityErrorKind),
    Config,
    Other(String),
}

/// Outcomes of the auth gate.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    /// Missing, malformed, badly signed or expired credential.
    Unauthenticated,
    /// Authenticated, but neither the role nor ownership allows the action.
    Forbidden,
}

/// Errors about the resources the domain layer manages.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    Conflict,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The identity directory timed out or failed to answer.
    DirectoryUnavailable,
    Other(String),
}

impl Error {
    pub fn unauthenticated() -> Self {
        Self::from_kind(DomainErrorKind::Internal(InternalErrorKind::Auth(
            AuthErrorKind::Unauthenticated,
        )))
    }

    pub fn forbidden() -> Self {
        Self::from_kind(DomainErrorKind::Internal(InternalErrorKind::Auth(
            AuthErrorKind::Forbidden,
        )))
    }

    pub fn entity(kind: EntityErrorKind) -> Self {
        Self::from_kind(DomainErrorKind::Internal(InternalErrorKind::Entity(kind)))
    }

    pub fn directory_unavailable() -> Self {
        Self::from_kind(DomainErrorKind::External(
            ExternalErrorKind::DirectoryUnavailable,
        ))
    }

    pub fn config() -> Self {
        Self::from_kind(DomainErrorKind::Internal(InternalErrorKind::Config))
    }

    fn from_kind(error_kind: DomainErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.error_kind
            == DomainErrorKind::Internal(InternalErrorKind::Auth(AuthErrorKind::Unauthenticated))
    }

    pub fn is_forbidden(&self) -> bool {
        self.error_kind
            == DomainErrorKind::Internal(InternalErrorKind::Auth(AuthErrorKind::Forbidden))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {:?}", self.error_kind)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Any failure to decode or validate a credential means the caller is not authenticated.
impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::unauthenticated().with_source(err)
    }
}

// Only raised while reading the directory seed file at start-up.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::config().with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::config().with_source(err)
    }
}
