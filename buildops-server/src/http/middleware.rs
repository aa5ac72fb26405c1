//! Per-client rate limiting

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use crate::state::AppState;

/// Rate-limit key for a request.
///
/// The peer address is the client unless the peer is one of `trusted`
/// proxies. Then `x-forwarded-for` is read right to left and the first hop
/// that is not itself a trusted proxy is the client. Entries that do not
/// parse as IP addresses stop the walk, since anything left of them is
/// client-controlled.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> String {
    let Some(peer_ip) = peer.map(|addr| addr.ip()) else {
        return "unknown".to_owned();
    };
    if !trusted.contains(&peer_ip) {
        return peer_ip.to_string();
    }

    let hops = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect::<Vec<_>>();

    let mut client = peer_ip;
    for hop in hops.iter().rev() {
        match hop.parse::<IpAddr>() {
            Ok(ip) if trusted.contains(&ip) => client = ip,
            Ok(ip) => return ip.to_string(),
            Err(_) => break,
        }
    }
    client.to_string()
}

/// Count the request against its client's window; reject with 429 when over.
///
/// A failing store lets the request through.
pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_ip(req.headers(), peer, &state.config.rate_limit.trusted_proxies);

    let decision = match state.rate_limiter().hit(&key).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, client = %key, "rate limiter unavailable, allowing request");
            return next.run(req).await;
        }
    };

    if !decision.allowed {
        tracing::debug!(client = %key, count = decision.count, "rate limit exceeded");
        return ApiError::TooManyRequests {
            retry_after_secs: state.config.rate_limit.window_secs,
        }
        .into_response();
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining()));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    fn peer(ip: [u8; 4]) -> Option<SocketAddr> {
        Some(SocketAddr::from((ip, 5000)))
    }

    #[test]
    fn untrusted_peer_ignores_forwarded_header() {
        let headers = forwarded("10.9.9.1");
        assert_eq!(client_ip(&headers, peer([203, 0, 113, 50]), &[]), "203.0.113.50");

        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(
            client_ip(&headers, peer([203, 0, 113, 50]), &[proxy]),
            "203.0.113.50"
        );
    }

    #[test]
    fn trusted_proxy_uses_rightmost_untrusted_hop() {
        let trusted: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()];
        // Left-most entry is whatever the client claimed
        let headers = forwarded("1.2.3.4, 198.51.100.7, 10.0.0.2");
        assert_eq!(client_ip(&headers, peer([10, 0, 0, 1]), &trusted), "198.51.100.7");
    }

    #[test]
    fn garbage_hop_stops_the_walk() {
        let trusted: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap()];
        let headers = forwarded("198.51.100.7, not-an-ip, 10.0.0.1");
        assert_eq!(client_ip(&headers, peer([10, 0, 0, 1]), &trusted), "10.0.0.1");
    }

    #[test]
    fn missing_peer_is_unknown() {
        assert_eq!(client_ip(&forwarded("198.51.100.7"), None, &[]), "unknown");
    }
}
