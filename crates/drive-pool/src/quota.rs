//! Quota detection for Drive API error responses
//!
//! Drive reports usage limits as 403 (and sometimes 429) with a reason code
//! in the JSON error body. Only those reasons mean the active account should
//! be rotated; other 403s are permission problems that rotation won't fix.

use storage::ErrorClassification;

/// Reason codes in Drive 403 bodies that mean the account hit a usage limit.
const QUOTA_REASONS: &[&str] = &[
    "userRateLimitExceeded",
    "rateLimitExceeded",
    "dailyLimitExceeded",
    "quotaExceeded",
    "downloadQuotaExceeded",
    "sharingRateLimitExceeded",
];

/// Classify a 403 body as usage-limit exhaustion or a permission error.
pub fn classify_403(body: &str) -> ErrorClassification {
    if QUOTA_REASONS.iter().any(|reason| body.contains(reason)) {
        ErrorClassification::QuotaExceeded
    } else {
        ErrorClassification::Permanent
    }
}

/// Classify a Drive error response by HTTP status and body.
pub fn classify_status(status: u16, body: &str) -> ErrorClassification {
    match status {
        403 => classify_403(body),
        429 => ErrorClassification::QuotaExceeded,
        401 => ErrorClassification::Permanent,
        _ => ErrorClassification::Transient,
    }
}
