//! Failure taxonomy surfaced by [`crate::StreamRepository`]
//!
//! Errors never cross the repository boundary as [`crate::Error`]: they are
//! folded into one of these variants and published as `Streams::Error`.

use crate::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    NoNetworkConnection,
    /// 400
    HttpErrorBadRequest,
    /// 401
    HttpErrorUnauthorized,
    /// 403
    HttpErrorForbidden,
    /// 404
    HttpErrorNotFound,
    /// 5xx
    HttpErrorInternalServerError,
    /// Any other 3xx or 4xx status
    HttpError,
    /// Everything else, parse failures included
    GenericError,
}

impl Failure {
    /// Maps an HTTP status code onto the taxonomy
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Failure::HttpErrorBadRequest,
            401 => Failure::HttpErrorUnauthorized,
            403 => Failure::HttpErrorForbidden,
            404 => Failure::HttpErrorNotFound,
            500..=599 => Failure::HttpErrorInternalServerError,
            300..=499 => Failure::HttpError,
            _ => Failure::GenericError,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::NoNetwork => Failure::NoNetworkConnection,
            Error::Status(code) => Failure::from_status(*code),
            Error::Http(err) => match err.status() {
                Some(status) => Failure::from_status(status.as_u16()),
                None => Failure::GenericError,
            },
            _ => Failure::GenericError,
        }
    }

    /// Key of the user-facing message under `messages.*`
    pub fn message_key(&self) -> &'static str {
        match self {
            Failure::NoNetworkConnection => "no_network_connection",
            Failure::HttpErrorBadRequest => "http_bad_request",
            Failure::HttpErrorUnauthorized => "http_unauthorized",
            Failure::HttpErrorForbidden => "http_forbidden",
            Failure::HttpErrorNotFound => "http_not_found",
            Failure::HttpErrorInternalServerError => "http_internal_server_error",
            Failure::HttpError => "http_error",
            Failure::GenericError => "generic_error",
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Failure::NoNetworkConnection => "No network connection available",
            Failure::HttpErrorBadRequest => "The catalog server rejected the request",
            Failure::HttpErrorUnauthorized => "Not authorized to load the catalog",
            Failure::HttpErrorForbidden => "Access to the catalog is forbidden",
            Failure::HttpErrorNotFound => "The catalog could not be found",
            Failure::HttpErrorInternalServerError => "The catalog server is having problems",
            Failure::HttpError => "The catalog server returned an unexpected response",
            Failure::GenericError => "Something went wrong while loading the catalog",
        }
    }
}

impl From<&Error> for Failure {
    fn from(error: &Error) -> Self {
        Failure::from_error(error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_message())
    }
}
