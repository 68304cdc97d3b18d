use actix_web::http::StatusCode;
use actix_web::ResponseError;
use std::net::AddrParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse remote IP address: {0}")]
    InvalidIp(
        #[source]
        #[from]
        AddrParseError,
    ),
    #[error("No {0} address is available for this request")]
    MissingAddress(&'static str),
    /// Not produced by the in-memory [RateLimiter](crate::backend::RateLimiter), which cannot
    /// fail. Available to external [Backend](crate::backend::Backend) implementations, such as
    /// one over a shared store, so their outages map to a `500` (or pass with fail open).
    #[error("Rate limit store unavailable: {0}")]
    Store(String),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidIp(_) | Error::MissingAddress(_) => StatusCode::BAD_REQUEST,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err: Error = "not-an-ip".parse::<std::net::IpAddr>().unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::MissingAddress("peer").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Store("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
