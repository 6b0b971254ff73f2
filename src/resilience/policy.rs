//! Retry policy.
//!
//! # Responsibilities
//! - Classify attempt outcomes as retryable or not
//! - Decide, after each attempt, whether to stop or retry after a delay
//!
//! # Design Decisions
//! - Immutable once built; cloned into every execution
//! - Delays grow exponentially and are clamped to `max_delay`
//! - Stop checks run in order: classification, attempt limit, deadline
//! - A `Retry-After` hint can lengthen a delay but never beyond `max_delay`

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::validation::validate_retries;
use crate::config::{RetryConfig, ValidationError};
use crate::resilience::backoff::{calculate_backoff, full_jitter};
use crate::resilience::state::AttemptOutcome;

/// Whether an outcome may be retried.
///
/// For a response, `NonRetryable` means the response is accepted and
/// handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    Retryable,
    NonRetryable,
}

/// Decides which outcomes are worth another attempt.
pub trait Classifier: Send + Sync {
    fn classify(&self, outcome: &AttemptOutcome) -> Retryability;
}

impl<F> Classifier for F
where
    F: Fn(&AttemptOutcome) -> Retryability + Send + Sync,
{
    fn classify(&self, outcome: &AttemptOutcome) -> Retryability {
        self(outcome)
    }
}

/// Default classifier.
///
/// Responses are retryable when their status is listed; transport failures
/// when their kind is transient; timeouts always.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusClassifier {
    retryable_statuses: Vec<u16>,
}

impl StatusClassifier {
    pub fn new(retryable_statuses: impl Into<Vec<u16>>) -> Self {
        Self {
            retryable_statuses: retryable_statuses.into(),
        }
    }

    pub fn retryable_statuses(&self) -> &[u16] {
        &self.retryable_statuses
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(vec![429, 502, 503, 504])
    }
}

impl Classifier for StatusClassifier {
    fn classify(&self, outcome: &AttemptOutcome) -> Retryability {
        let retryable = match outcome {
            AttemptOutcome::Success(response) => self.retryable_statuses.contains(&response.status_code()),
            AttemptOutcome::TransportFailure(err) => err.kind().is_transient(),
            AttemptOutcome::Timeout(_) => true,
        };
        if retryable {
            Retryability::Retryable
        } else {
            Retryability::NonRetryable
        }
    }
}

/// Why the policy stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxAttempts,
    NonRetryable,
    DeadlineExceeded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxAttempts => "max_attempts",
            StopReason::NonRetryable => "non_retryable",
            StopReason::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

/// Result of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Stop(StopReason),
    RetryAfter(Duration),
}

/// Errors raised while building a policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("base delay {base:?} exceeds max delay {max:?}")]
    DelayOrder { base: Duration, max: Duration },

    #[error("invalid retry configuration: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", "))]
    Config(Vec<ValidationError>),
}

/// Immutable retry policy shared by every execution of an executor.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    deadline: Option<Duration>,
    respect_retry_after: bool,
    idempotent_only: bool,
    classifier: Arc<dyn Classifier>,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..RetryPolicyBuilder::default().into_policy()
        }
    }

    /// Build from the `[retries]` config section.
    ///
    /// `enabled = false` yields [`RetryPolicy::no_retry`] with the configured classifier.
    pub fn from_config(config: &RetryConfig) -> Result<Self, PolicyError> {
        let errors = validate_retries(config);
        if !errors.is_empty() {
            return Err(PolicyError::Config(errors));
        }

        let max_attempts = if config.enabled { config.max_attempts } else { 1 };
        let mut builder = Self::builder()
            .max_attempts(max_attempts)
            .base_delay(config.base_delay())
            .max_delay(config.max_delay())
            .multiplier(config.multiplier)
            .jitter(config.jitter)
            .respect_retry_after(config.respect_retry_after)
            .idempotent_only(config.idempotent_only)
            .classifier(StatusClassifier::new(config.retryable_statuses.clone()));
        if let Some(deadline) = config.deadline() {
            builder = builder.deadline(deadline);
        }
        builder.build()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn idempotent_only(&self) -> bool {
        self.idempotent_only
    }

    pub fn classify(&self, outcome: &AttemptOutcome) -> Retryability {
        self.classifier.classify(outcome)
    }

    /// Delay before the attempt that follows `attempt`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay, self.multiplier)
    }

    /// Decide what follows attempt number `attempt` (1-based).
    pub fn decide(&self, attempt: u32, elapsed: Duration, outcome: &AttemptOutcome) -> Decision {
        if self.classify(outcome) == Retryability::NonRetryable {
            return Decision::Stop(StopReason::NonRetryable);
        }
        if attempt >= self.max_attempts {
            return Decision::Stop(StopReason::MaxAttempts);
        }
        if self.deadline.is_some_and(|deadline| elapsed >= deadline) {
            return Decision::Stop(StopReason::DeadlineExceeded);
        }

        let mut delay = self.backoff(attempt);
        if self.jitter {
            delay = full_jitter(delay);
        }
        if self.respect_retry_after {
            if let Some(hint) = outcome.response().and_then(|r| r.retry_after()) {
                delay = delay.max(hint).min(self.max_delay);
            }
        }
        Decision::RetryAfter(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyBuilder::default().into_policy()
    }
}

impl TryFrom<&RetryConfig> for RetryPolicy {
    type Error = PolicyError;

    fn try_from(config: &RetryConfig) -> Result<Self, Self::Error> {
        Self::from_config(config)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .field("jitter", &self.jitter)
            .field("deadline", &self.deadline)
            .field("respect_retry_after", &self.respect_retry_after)
            .field("idempotent_only", &self.idempotent_only)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryPolicy`]. Defaults match [`RetryConfig::default`].
pub struct RetryPolicyBuilder {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    deadline: Option<Duration>,
    respect_retry_after: bool,
    idempotent_only: bool,
    classifier: Arc<dyn Classifier>,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay: defaults.base_delay(),
            max_delay: defaults.max_delay(),
            multiplier: defaults.multiplier,
            jitter: defaults.jitter,
            deadline: defaults.deadline(),
            respect_retry_after: defaults.respect_retry_after,
            idempotent_only: defaults.idempotent_only,
            classifier: Arc::new(StatusClassifier::new(defaults.retryable_statuses)),
        }
    }
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    pub fn idempotent_only(mut self, idempotent_only: bool) -> Self {
        self.idempotent_only = idempotent_only;
        self
    }

    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(self.multiplier));
        }
        if self.base_delay > self.max_delay {
            return Err(PolicyError::DelayOrder {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        Ok(self.into_policy())
    }

    fn into_policy(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter: self.jitter,
            deadline: self.deadline,
            respect_retry_after: self.respect_retry_after,
            idempotent_only: self.idempotent_only,
            classifier: self.classifier,
        }
    }
}
