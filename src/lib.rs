#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod classifier;
pub mod clock;
mod error;
mod middleware;

pub use classifier::{classify, Classifier, Label};
pub use error::Error;
pub use middleware::builder::{insert_headers, too_many_requests, RateLimitBuilder};
pub use middleware::RateLimit;
