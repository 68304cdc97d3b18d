use crate::backend::{
    Decision, KeyFunctionBuilder, RateLimitPolicy, RateLimitStatus, RateLimiter,
};
use crate::middleware::*;
use crate::Error;
use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use actix_web::test::{read_body, TestRequest};
use actix_web::{get, post, test, App, HttpResponse, Responder};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[post("/api/credits")]
async fn award_credits() -> impl Responder {
    HttpResponse::Ok().body("credited")
}

#[get("/500")]
async fn route_500() -> impl Responder {
    HttpResponse::InternalServerError().body("Internal error")
}

#[derive(Clone, Default)]
struct MockBackend(Arc<MockBackendInner>);

#[derive(Default)]
struct MockBackendInner {
    counter: AtomicU64,
    unavailable: AtomicBool,
}

impl Backend for MockBackend {
    type RollbackToken = ();
    type Error = Error;

    async fn request(
        &self,
        input: RateLimitInput,
    ) -> Result<(RateLimitStatus, Self::RollbackToken), Self::Error> {
        if self.0.unavailable.load(Ordering::Relaxed) {
            return Err(Error::Store("connection refused".to_string()));
        }
        let used = self.0.counter.fetch_add(1, Ordering::Relaxed);
        let limit = input.policy.limit;
        let status = RateLimitStatus {
            decision: Decision::from_allowed(used < limit),
            limit,
            remaining: limit.saturating_sub(used + 1),
            reset: input.policy.window(),
        };
        Ok((status, ()))
    }

    async fn rollback(&self, _token: Self::RollbackToken) -> Result<(), Self::Error> {
        self.0.counter.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).map(|v| v.to_str().unwrap())
}

#[actix_web::test]
async fn test_allow_deny() {
    tokio::time::pause();
    let backend = RateLimiter::builder().with_sweep_interval(None).build();
    let input_fn = KeyFunctionBuilder::new(RateLimitPolicy::new(2))
        .action("award-credits")
        .build();
    let limiter = RateLimit::builder(backend.clone(), input_fn).build();
    let app = test::init_service(App::new().service(award_credits).wrap(limiter)).await;

    for remaining in ["1", "0"] {
        let response =
            test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(response.headers(), "x-ratelimit-limit"), Some("2"));
        assert_eq!(
            header(response.headers(), "x-ratelimit-remaining"),
            Some(remaining)
        );
        assert_eq!(header(response.headers(), "x-ratelimit-reset"), Some("60"));
        assert!(!response.headers().contains_key("retry-after"));
    }
    assert!(backend.contains_key("award-credits"));

    tokio::time::advance(Duration::from_millis(20_500)).await;
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    // 39.5 seconds until the first call ages out, rounded upwards
    assert_eq!(header(response.headers(), "retry-after"), Some("40"));
    assert_eq!(header(response.headers(), "x-ratelimit-remaining"), Some("0"));
    let body = read_body(response).await;
    assert!(body.is_empty());
}

#[actix_web::test]
async fn test_custom_deny_response() {
    let backend = MockBackend::default();
    let limiter = RateLimit::builder(backend, |_req| async {
        Ok(RateLimitInput {
            key: "generate".to_string(),
            policy: RateLimitPolicy::new(0),
        })
    })
    .request_denied_response(|status| {
        HttpResponse::build(StatusCode::IM_A_TEAPOT)
            .body(format!("Try again in {}s", status.retry_after_secs()))
    })
    .build();
    let app = test::init_service(App::new().service(award_credits).wrap(limiter)).await;
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    let body = String::from_utf8(read_body(response).await.to_vec()).unwrap();
    assert_eq!(body, "Try again in 60s");
}

#[actix_web::test]
async fn test_fail_open() {
    let backend = MockBackend::default();
    backend.0.unavailable.store(true, Ordering::Relaxed);
    let input_fn = || {
        KeyFunctionBuilder::new(RateLimitPolicy::new(u64::MAX))
            .action("checkout")
            .build()
    };

    // Test first without fail open
    let limiter = RateLimit::builder(backend.clone(), input_fn()).build();
    let app = test::init_service(App::new().service(award_credits).wrap(limiter)).await;
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Test again with fail open enabled
    let limiter = RateLimit::builder(backend, input_fn())
        .fail_open(true)
        .build();
    let app = test::init_service(App::new().service(award_credits).wrap(limiter)).await;
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    // No status is known, so no headers are set
    assert!(!response.headers().contains_key("x-ratelimit-remaining"));
}

#[actix_web::test]
async fn test_input_error() {
    let backend = MockBackend::default();
    let input_fn = KeyFunctionBuilder::new(RateLimitPolicy::new(10))
        .peer_ip_key()
        .build();
    let limiter = RateLimit::builder(backend.clone(), input_fn).build();
    let app = test::init_service(App::new().service(award_credits).wrap(limiter)).await;
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // The backend was never consulted
    assert_eq!(backend.0.counter.load(Ordering::Relaxed), 0);
}

#[actix_web::test]
async fn test_rollback() {
    let backend = MockBackend::default();
    let limiter = RateLimit::builder(backend.clone(), |_req| async {
        Ok(RateLimitInput {
            key: "generate".to_string(),
            policy: RateLimitPolicy::new(10),
        })
    })
    .rollback_server_errors()
    .build();
    let app = test::init_service(
        App::new()
            .service(award_credits)
            .service(route_500)
            .wrap(limiter),
    )
    .await;

    // Confirm count increases for a 200 response
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.0.counter.load(Ordering::Relaxed), 1);

    // Confirm count hasn't increased, and the refund is visible in the headers
    let response = test::call_service(&app, TestRequest::get().uri("/500").to_request()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(backend.0.counter.load(Ordering::Relaxed), 1);
    assert_eq!(header(response.headers(), "x-ratelimit-remaining"), Some("9"));
}

#[actix_web::test]
async fn test_rollback_with_in_memory_limiter() {
    let backend = RateLimiter::builder().with_sweep_interval(None).build();
    let input_fn = KeyFunctionBuilder::new(RateLimitPolicy::new(1))
        .action("generate")
        .build();
    let limiter = RateLimit::builder(backend, input_fn)
        .rollback_server_errors()
        .build();
    let app = test::init_service(
        App::new()
            .service(award_credits)
            .service(route_500)
            .wrap(limiter),
    )
    .await;

    // A failed call is refunded, so the single allowed call is still available
    let response = test::call_service(&app, TestRequest::get().uri("/500").to_request()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response =
        test::call_service(&app, TestRequest::post().uri("/api/credits").to_request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
