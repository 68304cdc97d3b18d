use crate::backend::{Backend, RateLimitInput, RateLimitStatus};
use crate::middleware::{DeniedResponse, RateLimit, RollbackCondition};
use actix_web::dev::ServiceRequest;
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use std::future::Future;
use std::rc::Rc;

pub static X_RATELIMIT_LIMIT: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-limit"));

pub static X_RATELIMIT_REMAINING: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-remaining"));

pub static X_RATELIMIT_RESET: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-reset"));

pub struct RateLimitBuilder<BE, F> {
    backend: BE,
    input_fn: F,
    fail_open: bool,
    denied_response: Rc<DeniedResponse>,
    rollback_condition: Option<Rc<RollbackCondition>>,
}

impl<BE, F, O> RateLimitBuilder<BE, F>
where
    BE: Backend + 'static,
    F: Fn(&ServiceRequest) -> O,
    O: Future<Output = Result<RateLimitInput, actix_web::Error>>,
{
    pub(super) fn new(backend: BE, input_fn: F) -> Self {
        Self {
            backend,
            input_fn,
            fail_open: false,
            denied_response: Rc::new(too_many_requests),
            rollback_condition: None,
        }
    }

    /// Choose whether to allow a request if the backend returns a failure.
    ///
    /// Default is false.
    pub fn fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// In the event that the request is denied, configure the [HttpResponse] returned.
    ///
    /// Defaults to an empty body with status 429, a `retry-after` header and the
    /// `x-ratelimit-*` headers.
    pub fn request_denied_response<R>(mut self, denied_response: R) -> Self
    where
        R: Fn(&RateLimitStatus) -> HttpResponse + 'static,
    {
        self.denied_response = Rc::new(denied_response);
        self
    }

    /// After processing a request, attempt to rollback the request count based on the status code
    /// of the returned response.
    ///
    /// By default the rate limit is never rolled back.
    pub fn rollback_condition<C>(mut self, condition: Option<C>) -> Self
    where
        C: Fn(StatusCode) -> bool + 'static,
    {
        self.rollback_condition = condition.map(|m| Rc::new(m) as Rc<RollbackCondition>);
        self
    }

    /// Configures the [RateLimitBuilder::rollback_condition] to rollback if the status code
    /// is a server error (5xx).
    pub fn rollback_server_errors(mut self) -> Self {
        self.rollback_condition = Some(Rc::new(|status| status.is_server_error()));
        self
    }

    pub fn build(self) -> RateLimit<BE, F> {
        RateLimit {
            backend: self.backend,
            input_fn: Rc::new(self.input_fn),
            fail_open: self.fail_open,
            denied_response: self.denied_response,
            rollback_condition: self.rollback_condition,
        }
    }
}

/// Sets `x-ratelimit-limit`, `x-ratelimit-remaining` and `x-ratelimit-reset` (seconds until the
/// reset).
pub fn insert_headers(map: &mut HeaderMap, status: &RateLimitStatus) {
    map.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(status.limit));
    map.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(status.remaining),
    );
    map.insert(
        X_RATELIMIT_RESET.clone(),
        HeaderValue::from(status.retry_after_secs()),
    );
}

/// The default denied response.
pub fn too_many_requests(status: &RateLimitStatus) -> HttpResponse {
    let mut response = HttpResponse::TooManyRequests().finish();
    let map = response.headers_mut();
    insert_headers(map, status);
    map.insert(RETRY_AFTER, HeaderValue::from(status.retry_after_secs()));
    response
}
