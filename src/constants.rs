pub mod network {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
    pub const API_PREFIX: &str = "/api/v1";
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const TIMEOUT_CONNECTION_MS: u64 = 5_000;
}

pub mod retry {
    use crate::services::classifier::FailureKind;

    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 250;
    pub const MAX_DELAY_MS: u64 = 5_000;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const JITTER: f64 = 0.2;

    pub const DEPLOYMENT_MAX_ATTEMPTS: u32 = 5;
    pub const DEPLOYMENT_BASE_DELAY_MS: u64 = 1_000;
    pub const DEPLOYMENT_MAX_DELAY_MS: u64 = 15_000;

    pub const TRANSIENT_KINDS: &[FailureKind] = &[
        FailureKind::Network,
        FailureKind::Timeout,
        FailureKind::ServerError,
        FailureKind::RateLimited,
    ];
}

pub mod limits {
    pub const MAX_RESPONSE_CHARS: usize = 20_000;
    pub const MAX_LIST_ITEMS: usize = 50;
    pub const OVERSIZED_LIST_ITEMS: usize = 10;
    pub const MAX_LOG_CHARS: usize = 10_000;
    pub const LOG_TAIL_ENTRIES: usize = 20;
}

pub mod config {
    pub const LOCAL_CONFIG_FILE: &str = "coolify.config.local.json";
}
