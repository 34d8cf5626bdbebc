use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Worker count must be positive")]
    NoWorkers,

    #[error("Worker channel size must be positive")]
    ZeroChannelSize,

    #[error("Worker max_attempts must be positive")]
    ZeroAttempts,

    #[error("Redirect hop_limit must be positive")]
    ZeroHopLimit,

    #[error("max_uris_per_batch must be positive")]
    ZeroBatchLimit,

    #[error("max_payload_bytes must be positive")]
    ZeroPayloadLimit,

    #[error("risky_tlds entries must be non-empty")]
    EmptyRiskyTld,

    #[error("Retention TTL must be positive: {field} = 0")]
    InvalidRetentionTTL { field: String },

    #[error(
        "check_ttl_days ({ttl_days} days) must not be shorter than the default freshness window"
    )]
    RetentionBelowFreshnessWindow { ttl_days: u32 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.worker.count == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.worker.channel_size == 0 {
        return Err(ValidationError::ZeroChannelSize);
    }
    if config.worker.max_attempts == 0 {
        return Err(ValidationError::ZeroAttempts);
    }
    if config.checker.hop_limit == 0 {
        return Err(ValidationError::ZeroHopLimit);
    }
    if config.server.api.max_uris_per_batch == 0 {
        return Err(ValidationError::ZeroBatchLimit);
    }
    if config.server.api.max_payload_bytes == 0 {
        return Err(ValidationError::ZeroPayloadLimit);
    }
    if config.checker.risky_tlds.iter().any(|tld| tld.trim().is_empty()) {
        return Err(ValidationError::EmptyRiskyTld);
    }

    if config.retention.check_ttl_days == 0 {
        return Err(ValidationError::InvalidRetentionTTL {
            field: "check_ttl_days".to_string(),
        });
    }
    if config.retention.batch_ttl_days == 0 {
        return Err(ValidationError::InvalidRetentionTTL {
            field: "batch_ttl_days".to_string(),
        });
    }

    // A check pruned inside the freshness window would be re-created on the
    // next submission anyway, but the window would silently stop deduping.
    if config.retention.check_ttl_days < 2 {
        return Err(ValidationError::RetentionBelowFreshnessWindow {
            ttl_days: config.retention.check_ttl_days,
        });
    }

    Ok(())
}
