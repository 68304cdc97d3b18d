pub mod builder;
#[cfg(test)]
mod tests;

use crate::backend::{Backend, RateLimitInput, RateLimitStatus};
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use builder::RateLimitBuilder;
use futures::future::{ok, LocalBoxFuture, Ready};
use std::{future::Future, rc::Rc};

type DeniedResponse = dyn Fn(&RateLimitStatus) -> HttpResponse;
type RollbackCondition = dyn Fn(StatusCode) -> bool;

/// Rate limit middleware.
///
/// Runs before the guarded handler, so that denied requests never reach the expensive or
/// cost-incurring work.
pub struct RateLimit<BA, F> {
    backend: BA,
    input_fn: Rc<F>,
    fail_open: bool,
    denied_response: Rc<DeniedResponse>,
    rollback_condition: Option<Rc<RollbackCondition>>,
}

impl<BA: Clone, F> Clone for RateLimit<BA, F> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            input_fn: self.input_fn.clone(),
            fail_open: self.fail_open,
            denied_response: self.denied_response.clone(),
            rollback_condition: self.rollback_condition.clone(),
        }
    }
}

impl<BA, F, O> RateLimit<BA, F>
where
    BA: Backend + 'static,
    F: Fn(&ServiceRequest) -> O + 'static,
    O: Future<Output = Result<RateLimitInput, actix_web::Error>>,
{
    /// # Arguments
    ///
    /// * `backend`: A rate limiting store, usually a [RateLimiter](crate::backend::RateLimiter).
    /// * `input_fn`: A future that produces the key and policy for the incoming request, see
    ///   [KeyFunctionBuilder](crate::backend::KeyFunctionBuilder).
    pub fn builder(backend: BA, input_fn: F) -> RateLimitBuilder<BA, F> {
        RateLimitBuilder::new(backend, input_fn)
    }
}

impl<S, B, BA, BE, F, O> Transform<S, ServiceRequest> for RateLimit<BA, F>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
    BA: Backend<Error = BE> + 'static,
    BE: Into<actix_web::Error> + std::fmt::Display + 'static,
    F: Fn(&ServiceRequest) -> O + 'static,
    O: Future<Output = Result<RateLimitInput, actix_web::Error>> + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = RateLimitMiddleware<S, BA, F>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
            backend: self.backend.clone(),
            input_fn: Rc::clone(&self.input_fn),
            fail_open: self.fail_open,
            denied_response: self.denied_response.clone(),
            rollback_condition: self.rollback_condition.clone(),
        })
    }
}

pub struct RateLimitMiddleware<S, BA, F> {
    service: Rc<S>,
    backend: BA,
    input_fn: Rc<F>,
    fail_open: bool,
    denied_response: Rc<DeniedResponse>,
    rollback_condition: Option<Rc<RollbackCondition>>,
}

impl<S, B, BA, BE, F, O> Service<ServiceRequest> for RateLimitMiddleware<S, BA, F>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
    BA: Backend<Error = BE> + 'static,
    BE: Into<actix_web::Error> + std::fmt::Display + 'static,
    F: Fn(&ServiceRequest) -> O + 'static,
    O: Future<Output = Result<RateLimitInput, actix_web::Error>> + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let backend = self.backend.clone();
        let input_fn = self.input_fn.clone();
        let fail_open = self.fail_open;
        let denied_response = self.denied_response.clone();
        let rollback_condition = self.rollback_condition.clone();

        Box::pin(async move {
            let input = match (input_fn)(&req).await {
                Ok(input) => input,
                Err(e) => {
                    log::error!("Rate limit input function failed: {e}");
                    return Ok(req.into_response(e.error_response()).map_into_right_body());
                }
            };

            let (status, rollback) = match backend.request(input).await {
                Ok((status, rollback)) => {
                    if status.decision.is_denied() {
                        let response: HttpResponse = (denied_response)(&status);
                        return Ok(req.into_response(response).map_into_right_body());
                    }
                    (Some(status), Some(rollback))
                }
                Err(e) => {
                    if fail_open {
                        log::warn!("Rate limit backend failed: {e}, allowing the request anyway");
                        (None, None)
                    } else {
                        log::error!("Rate limit backend failed: {e}");
                        let e: actix_web::Error = e.into();
                        return Ok(req.into_response(e.error_response()).map_into_right_body());
                    }
                }
            };

            let mut service_response = service.call(req).await?;

            let mut rolled_back = false;
            if let (Some(token), Some(condition)) = (rollback, rollback_condition) {
                let code = service_response.status();
                if condition(code) {
                    match backend.rollback(token).await {
                        Ok(()) => rolled_back = true,
                        Err(e) => log::error!(
                            "Unable to rollback rate limit count for response: {code:?}, error: {e}"
                        ),
                    }
                }
            }

            if let Some(mut status) = status {
                if rolled_back {
                    status.remaining = (status.remaining + 1).min(status.limit);
                }
                builder::insert_headers(service_response.headers_mut(), &status);
            }

            Ok(service_response.map_into_left_body())
        })
    }
}
