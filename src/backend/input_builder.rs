use crate::backend::{RateLimitInput, RateLimitPolicy};
use crate::Error;
use actix_web::dev::ServiceRequest;
use std::future::{ready, Ready};
use std::net::{IpAddr, Ipv6Addr};

type UserFn = Box<dyn Fn(&ServiceRequest) -> Result<String, actix_web::Error>>;

pub type InputFuture = Ready<Result<RateLimitInput, actix_web::Error>>;

/// Utility to create an input function that produces a [RateLimitInput] for the
/// [RateLimit](crate::RateLimit) middleware.
///
/// Key components are joined with `:`, in the order action, real IP, peer IP, path, user. You
/// should take care to ensure that each guarded endpoint uses a distinct action.
pub struct KeyFunctionBuilder {
    policy: RateLimitPolicy,
    action: Option<String>,
    real_ip_key: bool,
    peer_ip_key: bool,
    path_key: bool,
    user_fn: Option<UserFn>,
}

impl KeyFunctionBuilder {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            action: None,
            real_ip_key: false,
            peer_ip_key: false,
            path_key: false,
            user_fn: None,
        }
    }

    /// Name the action being limited, e.g. `award-credits` or `create-checkout`.
    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.to_owned());
        self
    }

    /// Adds the client's real IP to the rate limiting key.
    ///
    /// # Security
    ///
    /// This calls
    /// [ConnectionInfo::realip_remote_addr()](actix_web::dev::ConnectionInfo::realip_remote_addr)
    /// internally which is only suitable for applications deployed behind a proxy that you
    /// control.
    ///
    /// # IPv6
    ///
    /// IPv6 addresses will be grouped into a single key per /64
    pub fn real_ip_key(mut self) -> Self {
        self.real_ip_key = true;
        self
    }

    /// Adds the connection peer IP to the rate limiting key.
    ///
    /// # IPv6
    ///
    /// IPv6 addresses will be grouped into a single key per /64
    pub fn peer_ip_key(mut self) -> Self {
        self.peer_ip_key = true;
        self
    }

    /// Add the request path to the rate limiting key
    pub fn path_key(mut self) -> Self {
        self.path_key = true;
        self
    }

    /// Dynamically add the caller's identity to the rate limiting key, e.g. a user id taken from
    /// the session.
    pub fn user_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&ServiceRequest) -> Result<String, actix_web::Error> + 'static,
    {
        self.user_fn = Some(Box::new(f));
        self
    }

    pub fn build(self) -> impl Fn(&ServiceRequest) -> InputFuture + 'static {
        move |req| {
            ready((|| {
                let mut components = Vec::new();
                let info = req.connection_info();
                if let Some(action) = &self.action {
                    components.push(action.clone());
                }
                if self.real_ip_key {
                    let addr = info
                        .realip_remote_addr()
                        .ok_or(Error::MissingAddress("client"))?;
                    components.push(ip_key(addr)?);
                }
                if self.peer_ip_key {
                    let addr = info.peer_addr().ok_or(Error::MissingAddress("peer"))?;
                    components.push(ip_key(addr)?);
                }
                if self.path_key {
                    components.push(req.path().to_owned());
                }
                if let Some(f) = &self.user_fn {
                    components.push(f(req)?);
                }

                Ok(RateLimitInput {
                    key: components.join(":"),
                    policy: self.policy,
                })
            })())
        }
    }
}

// Groups IPv6 addresses together, see:
// https://adam-p.ca/blog/2022/02/ipv6-rate-limiting/
fn ip_key(ip_str: &str) -> Result<String, Error> {
    let ip = ip_str.parse::<IpAddr>()?;
    Ok(match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return Ok(v4.to_string());
            }
            let [a, b, c, d, ..] = v6.segments();
            let subnet = Ipv6Addr::new(a, b, c, d, 0, 0, 0, 0);
            format!("{}/64", subnet)
        }
    })
}
