//! HTTP-facing shapes for rate-limit decisions
//!
//! Framework-agnostic: headers are `(name, value)` pairs and the 429 body is
//! a serde type, so any HTTP layer can attach them.

use super::limiter::RateLimitDecision;
use crate::constants::http;
use serde::{Deserialize, Serialize};

impl RateLimitDecision {
    /// `X-RateLimit-*` headers, plus `Retry-After` when rejected
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (http::HEADER_LIMIT, self.limit.to_string()),
            (http::HEADER_REMAINING, self.remaining.to_string()),
            (http::HEADER_RESET, self.reset_after_seconds.to_string()),
        ];
        if !self.allowed {
            headers.push((http::HEADER_RETRY_AFTER, self.reset_after_seconds.to_string()));
        }
        headers
    }

    /// The 429 response for a rejected decision, `None` when allowed
    pub fn rejection(&self) -> Option<RateLimitRejection> {
        if self.allowed {
            return None;
        }
        Some(RateLimitRejection {
            status: http::STATUS_TOO_MANY_REQUESTS,
            headers: self.headers(),
            body: RateLimitExceededBody::new(self.reset_after_seconds),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDetails {
    pub retry_after_seconds: u64,
}

/// `{success: false, error: "rate_limit_exceeded", message, details}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitExceededBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub details: RetryDetails,
}

impl RateLimitExceededBody {
    pub fn new(retry_after_seconds: u64) -> Self {
        Self {
            success: false,
            error: http::ERROR_RATE_LIMIT_EXCEEDED.to_string(),
            message: format!("Too many requests. Try again in {retry_after_seconds} seconds."),
            details: RetryDetails {
                retry_after_seconds,
            },
        }
    }
}

/// Everything the HTTP layer needs to answer a rejected request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRejection {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: RateLimitExceededBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(allowed: bool) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            limit: 10,
            remaining: if allowed { 4 } else { 0 },
            reset_after_seconds: 37,
        }
    }

    #[test]
    fn test_allowed_headers() {
        let headers = decision(true).headers();
        assert_eq!(
            headers,
            vec![
                ("X-RateLimit-Limit", "10".to_string()),
                ("X-RateLimit-Remaining", "4".to_string()),
                ("X-RateLimit-Reset", "37".to_string()),
            ]
        );
        assert!(decision(true).rejection().is_none());
    }

    #[test]
    fn test_rejection_shape() {
        let rejection = decision(false).rejection().unwrap();
        assert_eq!(rejection.status, 429);
        assert!(rejection
            .headers
            .contains(&("Retry-After", "37".to_string())));

        let body = serde_json::to_value(&rejection.body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "rate_limit_exceeded");
        assert_eq!(body["details"]["retry_after_seconds"], 37);
        assert!(body["message"].as_str().unwrap().contains("37"));
    }
}
