use crate::constants::retry as retry_constants;
use crate::errors::{ApiError, ConfigError};
use crate::services::classifier::{classify, ClassifiedFailure, FailureKind};
use crate::services::logger::Logger;
use once_cell::sync::Lazy;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const API_PROFILE: &str = "api";
pub const DEPLOYMENT_PROFILE: &str = "deployment";
pub const NO_RETRY_PROFILE: &str = "none";

/// Named, immutable retry/backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryProfile {
    pub name: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ratio: f64,
    retryable_kinds: HashSet<FailureKind>,
}

impl RetryProfile {
    /// Out-of-range values are clamped and caller-error kinds are dropped from
    /// the retryable set.
    pub fn new(
        name: &str,
        max_attempts: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
        backoff_multiplier: f64,
        jitter_ratio: f64,
        retryable_kinds: impl IntoIterator<Item = FailureKind>,
    ) -> Self {
        let multiplier = if backoff_multiplier.is_finite() {
            backoff_multiplier.max(1.0)
        } else {
            1.0
        };
        let jitter = if jitter_ratio.is_finite() {
            jitter_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            name: name.to_string(),
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: multiplier,
            jitter_ratio: jitter,
            retryable_kinds: retryable_kinds
                .into_iter()
                .filter(|kind| !kind.is_caller_error())
                .collect(),
        }
    }

    pub fn api() -> Self {
        Self::new(
            API_PROFILE,
            retry_constants::MAX_ATTEMPTS,
            retry_constants::BASE_DELAY_MS,
            retry_constants::MAX_DELAY_MS,
            retry_constants::BACKOFF_MULTIPLIER,
            retry_constants::JITTER,
            retry_constants::TRANSIENT_KINDS.iter().copied(),
        )
    }

    pub fn deployment() -> Self {
        Self::new(
            DEPLOYMENT_PROFILE,
            retry_constants::DEPLOYMENT_MAX_ATTEMPTS,
            retry_constants::DEPLOYMENT_BASE_DELAY_MS,
            retry_constants::DEPLOYMENT_MAX_DELAY_MS,
            retry_constants::BACKOFF_MULTIPLIER,
            retry_constants::JITTER,
            retry_constants::TRANSIENT_KINDS.iter().copied(),
        )
    }

    pub fn no_retry() -> Self {
        Self::new(NO_RETRY_PROFILE, 1, 0, 0, 1.0, 0.0, [])
    }

    pub fn retries(&self, kind: FailureKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    pub fn retryable_kinds(&self) -> impl Iterator<Item = FailureKind> + '_ {
        self.retryable_kinds.iter().copied()
    }

    /// Returns a copy with the keys present in `source` applied on top.
    pub fn with_overrides(&self, source: &Value) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRetryProfile {
            profile: self.name.clone(),
            reason: reason.to_string(),
        };
        let obj = source
            .as_object()
            .ok_or_else(|| invalid("override must be an object"))?;

        let max_attempts = match obj.get("max_attempts") {
            Some(v) => v
                .as_u64()
                .filter(|n| *n >= 1)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid("max_attempts must be an integer >= 1"))?,
            None => self.max_attempts,
        };
        let base_delay_ms = match obj.get("base_delay_ms") {
            Some(v) => v
                .as_u64()
                .ok_or_else(|| invalid("base_delay_ms must be a non-negative integer"))?,
            None => self.base_delay_ms,
        };
        let max_delay_ms = match obj.get("max_delay_ms") {
            Some(v) => v
                .as_u64()
                .ok_or_else(|| invalid("max_delay_ms must be a non-negative integer"))?,
            None => self.max_delay_ms,
        };
        let backoff_multiplier = match obj.get("backoff_multiplier") {
            Some(v) => v
                .as_f64()
                .filter(|m| *m >= 1.0)
                .ok_or_else(|| invalid("backoff_multiplier must be >= 1"))?,
            None => self.backoff_multiplier,
        };
        let jitter_ratio = match obj.get("jitter_ratio").or_else(|| obj.get("jitter")) {
            Some(v) => v
                .as_f64()
                .filter(|j| (0.0..=1.0).contains(j))
                .ok_or_else(|| invalid("jitter_ratio must be within [0, 1]"))?,
            None => self.jitter_ratio,
        };
        let kinds: Vec<FailureKind> = match obj.get("retryable_kinds") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .and_then(FailureKind::parse)
                        .ok_or_else(|| invalid(&format!("unknown failure kind {}", item)))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid("retryable_kinds must be an array")),
            None => self.retryable_kinds().collect(),
        };

        Ok(Self::new(
            &self.name,
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier,
            jitter_ratio,
            kinds,
        ))
    }
}

/// Profile lookup by operation category.
#[derive(Debug, Clone)]
pub struct RetryProfiles {
    profiles: HashMap<String, RetryProfile>,
}

impl Default for RetryProfiles {
    fn default() -> Self {
        let profiles = [
            RetryProfile::api(),
            RetryProfile::deployment(),
            RetryProfile::no_retry(),
        ]
        .into_iter()
        .map(|profile| (profile.name.clone(), profile))
        .collect();
        Self { profiles }
    }
}

impl RetryProfiles {
    /// Applies `{ "<category>": { ...overrides } }` on top of the defaults.
    /// Unknown categories define new profiles derived from `api`.
    pub fn with_overrides(overrides: Option<&Value>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        let Some(overrides) = overrides.filter(|v| !v.is_null()) else {
            return Ok(registry);
        };
        let map = overrides
            .as_object()
            .ok_or_else(|| ConfigError::InvalidRetryProfile {
                profile: "*".to_string(),
                reason: "retry overrides must be an object keyed by profile name".to_string(),
            })?;
        for (name, source) in map {
            let base = registry.profiles.get(name).cloned().unwrap_or_else(|| {
                let mut derived = RetryProfile::api();
                derived.name = name.clone();
                derived
            });
            let updated = base.with_overrides(source)?;
            registry.profiles.insert(name.clone(), updated);
        }
        Ok(registry)
    }

    pub fn get(&self, category: &str) -> Option<&RetryProfile> {
        self.profiles.get(category)
    }

    /// Falls back to the `api` profile for unknown categories.
    pub fn resolve(&self, category: &str) -> &RetryProfile {
        self.profiles
            .get(category)
            .or_else(|| self.profiles.get(API_PROFILE))
            .unwrap_or_else(|| Lazy::force(&FALLBACK_PROFILE))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

static FALLBACK_PROFILE: Lazy<RetryProfile> = Lazy::new(RetryProfile::api);

/// Per-invocation retry bookkeeping. Never shared between calls.
#[derive(Debug, Clone, Serialize)]
pub struct RetryAttemptState {
    pub attempt_number: u32,
    pub category: String,
    pub next_delay_ms: u64,
    pub exhausted: bool,
}

impl RetryAttemptState {
    fn start(category: &str) -> Self {
        Self {
            attempt_number: 1,
            category: category.to_string(),
            next_delay_ms: 0,
            exhausted: false,
        }
    }
}

pub fn should_retry(profile: &RetryProfile, classified: &ClassifiedFailure<'_>, attempt: u32) -> bool {
    if attempt >= profile.max_attempts {
        return false;
    }
    if classified.kind.is_caller_error() {
        return false;
    }
    profile.retries(classified.kind)
}

/// Capped exponential backoff before jitter.
pub fn base_delay(profile: &RetryProfile, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let raw = profile.base_delay_ms as f64 * profile.backoff_multiplier.powi(exponent);
    let capped = raw.min(profile.max_delay_ms as f64);
    if capped.is_finite() {
        capped.max(0.0) as u64
    } else {
        profile.max_delay_ms
    }
}

pub fn compute_delay(profile: &RetryProfile, attempt: u32) -> u64 {
    compute_delay_with(profile, attempt, &mut rand::thread_rng())
}

/// Backoff with symmetric jitter drawn from `rng`.
pub fn compute_delay_with<R: Rng + ?Sized>(profile: &RetryProfile, attempt: u32, rng: &mut R) -> u64 {
    let delay = base_delay(profile, attempt) as f64;
    if profile.jitter_ratio <= 0.0 || delay <= 0.0 {
        return delay as u64;
    }
    let low = delay * (1.0 - profile.jitter_ratio);
    let high = delay * (1.0 + profile.jitter_ratio);
    rng.gen_range(low..=high).max(0.0).floor() as u64
}

/// Delay before the next attempt, honoring a rate-limit `Retry-After` hint.
pub fn delay_for(profile: &RetryProfile, classified: &ClassifiedFailure<'_>, attempt: u32) -> u64 {
    if classified.kind == FailureKind::RateLimited {
        if let Some(hint) = classified.raw_cause.retry_after() {
            let hinted = u64::try_from(hint.as_millis()).unwrap_or(u64::MAX);
            return hinted.min(profile.max_delay_ms);
        }
    }
    compute_delay(profile, attempt)
}

/// Runs async operations under a [`RetryProfile`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    logger: Logger,
}

impl RetryExecutor {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("retry"),
        }
    }

    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        profile: &RetryProfile,
        operation: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.execute_with_retry_cancellable(profile, &CancellationToken::new(), operation)
            .await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but aborts with a
    /// `CANCELLED` error as soon as `cancel` fires, including mid-attempt and
    /// mid-backoff.
    pub async fn execute_with_retry_cancellable<T, F, Fut>(
        &self,
        profile: &RetryProfile,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut state = RetryAttemptState::start(&profile.name);
        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::cancelled());
            }
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                result = operation() => result,
            };

            let err = match outcome {
                Ok(value) => {
                    if state.attempt_number > 1 {
                        self.logger.debug(
                            "Recovered after retry",
                            Some(&serde_json::json!({
                                "category": state.category,
                                "attempt": state.attempt_number,
                            })),
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let classified = classify(&err);
            if !should_retry(profile, &classified, state.attempt_number) {
                state.exhausted = true;
                self.logger.debug(
                    "Giving up",
                    Some(&serde_json::json!({
                        "state": state,
                        "kind": classified.kind,
                        "status": classified.http_status,
                        "message": err.message(),
                    })),
                );
                return Err(err);
            }

            state.next_delay_ms = delay_for(profile, &classified, state.attempt_number);
            self.logger.warn(
                "Retrying request",
                Some(&serde_json::json!({
                    "state": state,
                    "kind": classified.kind,
                    "status": classified.http_status,
                    "message": err.message(),
                })),
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                _ = tokio::time::sleep(Duration::from_millis(state.next_delay_ms)) => {}
            }
            state.attempt_number += 1;
        }
    }
}
