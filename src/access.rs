//! Gateway access control: IP allow-list and request throttle.
//!
//! Both checks run as one axum middleware in front of every route, so a
//! rejected request never reaches a handler.
//!
//! - The allow-list is default-deny: a client address must fall inside one
//!   of the configured CIDR blocks, otherwise the request gets `403`.
//! - The throttle is a single token bucket shared by all clients:
//!   `rate_limit` tokens per second, holding at most `burst_limit`. An
//!   empty bucket answers `429`.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::ServerConfig;
use crate::server::AppError;

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl FromStr for Cidr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let network: IpAddr = addr
            .parse()
            .with_context(|| format!("invalid IP address in '{}'", s))?;
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix = match prefix {
            Some(p) => p
                .parse::<u8>()
                .with_context(|| format!("invalid prefix length in '{}'", s))?,
            None => max,
        };
        if prefix > max {
            bail!("prefix length {} exceeds {} in '{}'", prefix, max, s);
        }
        Ok(Self { network, prefix })
    }
}

impl Cidr {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, normalize(ip)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                prefix_eq(u32::from(net) as u128, u32::from(ip) as u128, self.prefix, 32)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                prefix_eq(u128::from(net), u128::from(ip), self.prefix, 128)
            }
            _ => false,
        }
    }
}

/// IPv4-mapped IPv6 addresses (dual-stack listeners) compare as IPv4.
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

fn prefix_eq(a: u128, b: u128, prefix: u8, bits: u32) -> bool {
    if prefix == 0 {
        return true;
    }
    let shift = bits - prefix as u32;
    (a >> shift) == (b >> shift)
}

#[derive(Debug, Clone, Default)]
pub struct IpAllowList {
    blocks: Vec<Cidr>,
}

impl IpAllowList {
    pub fn from_cidrs(cidrs: &[String]) -> Result<Self> {
        let blocks = cidrs
            .iter()
            .map(|c| c.parse())
            .collect::<Result<Vec<Cidr>>>()?;
        Ok(Self { blocks })
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        self.blocks.iter().any(|b| b.contains(ip))
    }
}

/// Token bucket throttle.
#[derive(Debug)]
pub struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self::starting_at(rate_per_sec, burst, Instant::now())
    }

    fn starting_at(rate_per_sec: u32, burst: u32, now: Instant) -> Self {
        Self {
            rate_per_sec: rate_per_sec as f64,
            capacity: burst as f64,
            tokens: burst as f64,
            last_refill: now,
        }
    }

    /// Take one token, refilling for the time elapsed since the last call.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared state for the access-control middleware.
#[derive(Clone)]
pub struct AccessControl {
    allow_list: Arc<IpAllowList>,
    bucket: Arc<Mutex<TokenBucket>>,
    trust_forwarded_for: bool,
}

impl AccessControl {
    pub fn from_config(server: &ServerConfig) -> Result<Self> {
        Ok(Self {
            allow_list: Arc::new(IpAllowList::from_cidrs(&server.allowed_ips)?),
            bucket: Arc::new(Mutex::new(TokenBucket::new(
                server.rate_limit,
                server.burst_limit,
            ))),
            trust_forwarded_for: server.trust_forwarded_for,
        })
    }

    /// Address the allow-list is checked against.
    fn client_ip(&self, peer: IpAddr, headers: &HeaderMap) -> IpAddr {
        if !self.trust_forwarded_for {
            return peer;
        }
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(peer)
    }

    fn try_acquire(&self) -> bool {
        match self.bucket.lock() {
            Ok(mut bucket) => bucket.try_acquire_at(Instant::now()),
            // A poisoned bucket only means a panic mid-update; keep serving.
            Err(poisoned) => poisoned.into_inner().try_acquire_at(Instant::now()),
        }
    }
}

/// Middleware enforcing the allow-list, then the throttle.
pub async fn enforce(
    State(access): State<AccessControl>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let ip = access.client_ip(peer.ip(), req.headers());
    if !access.allow_list.allows(ip) {
        tracing::warn!(%ip, path = %req.uri().path(), "request blocked by IP allow-list");
        return AppError::new(StatusCode::FORBIDDEN, "forbidden", "client address not allowed")
            .into_response();
    }
    if !access.try_acquire() {
        tracing::warn!(%ip, "request throttled");
        return AppError::new(StatusCode::TOO_MANY_REQUESTS, "throttled", "rate limit exceeded")
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_cidr_v4_contains() {
        let net: Cidr = "203.0.113.0/24".parse().unwrap();
        assert!(net.contains(ip("203.0.113.7")));
        assert!(!net.contains(ip("203.0.114.7")));
    }

    #[test]
    fn test_bare_address_is_host_route() {
        let net: Cidr = "198.51.100.10".parse().unwrap();
        assert!(net.contains(ip("198.51.100.10")));
        assert!(!net.contains(ip("198.51.100.11")));
    }

    #[test]
    fn test_zero_prefix_matches_family() {
        let net: Cidr = "0.0.0.0/0".parse().unwrap();
        assert!(net.contains(ip("8.8.8.8")));
        assert!(!net.contains(ip("2001:db8::1")));
    }

    #[test]
    fn test_cidr_v6_and_mapped_v4() {
        let v6: Cidr = "2001:db8::/32".parse().unwrap();
        assert!(v6.contains(ip("2001:db8:1::1")));
        assert!(!v6.contains(ip("2001:db9::1")));

        let v4: Cidr = "127.0.0.1/32".parse().unwrap();
        assert!(v4.contains(ip("::ffff:127.0.0.1")));
    }

    #[test]
    fn test_invalid_cidrs() {
        assert!("10.0.0.0/33".parse::<Cidr>().is_err());
        assert!("not-an-ip/8".parse::<Cidr>().is_err());
        assert!("10.0.0.0/x".parse::<Cidr>().is_err());
    }

    #[test]
    fn test_empty_allow_list_denies_everything() {
        let list = IpAllowList::from_cidrs(&[]).unwrap();
        assert!(!list.allows(ip("127.0.0.1")));
    }

    #[test]
    fn test_bucket_burst_then_refill() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(10, 3, start);
        assert!(bucket.try_acquire_at(start));
        assert!(bucket.try_acquire_at(start));
        assert!(bucket.try_acquire_at(start));
        assert!(!bucket.try_acquire_at(start));

        // 10 tokens/s: 100ms buys one more request.
        let later = start + Duration::from_millis(100);
        assert!(bucket.try_acquire_at(later));
        assert!(!bucket.try_acquire_at(later));
    }

    #[test]
    fn test_bucket_never_exceeds_burst() {
        let start = Instant::now();
        let mut bucket = TokenBucket::starting_at(100, 2, start);
        let much_later = start + Duration::from_secs(60);
        assert!(bucket.try_acquire_at(much_later));
        assert!(bucket.try_acquire_at(much_later));
        assert!(!bucket.try_acquire_at(much_later));
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let mut server = ServerConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());

        let access = AccessControl::from_config(&server).unwrap();
        assert_eq!(access.client_ip(ip("10.0.0.1"), &headers), ip("10.0.0.1"));

        server.trust_forwarded_for = true;
        let access = AccessControl::from_config(&server).unwrap();
        assert_eq!(access.client_ip(ip("10.0.0.1"), &headers), ip("203.0.113.9"));
    }
}
