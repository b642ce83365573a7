//! Answer generation.
//!
//! The generator is an external LLM call. Calls are bounded by a per-attempt
//! timeout and retried with exponential backoff.

mod openai;

pub use openai::OpenAIGenerator;

use crate::error::{Result, SvarError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// A rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    pub system: String,
    pub user: String,
}

/// Trait for answer generators.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for the prompt.
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String>;
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
    /// Timeout applied to each attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Run `fut`, failing with [`SvarError::Timeout`] if it takes longer than `duration`.
pub(crate) async fn with_timeout<T, F>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| SvarError::Timeout(duration))?
}

/// Call the generator, retrying transient failures according to `policy`.
///
/// Non-retryable errors stop immediately. Whatever the last failure was, it is
/// surfaced as [`SvarError::Generation`].
pub async fn generate_with_retry(
    generator: &dyn Generator,
    prompt: &GenerationPrompt,
    policy: &RetryPolicy,
) -> Result<String> {
    let mut retry = 0;

    loop {
        let error = match with_timeout(policy.attempt_timeout, generator.generate(prompt)).await {
            Ok(answer) => return Ok(answer),
            Err(e) => e,
        };

        if !error.is_retryable() || retry >= policy.max_retries {
            return Err(match error {
                SvarError::Generation(_) => error,
                other => SvarError::Generation(format!("{} (after {} attempts)", other, retry + 1)),
            });
        }

        retry += 1;
        let delay = policy.backoff(retry);
        warn!("Generation attempt {} failed: {}. Retrying in {:?}", retry, error, delay);
        tokio::time::sleep(delay).await;
        debug!("Retrying generation (retry {}/{})", retry, policy.max_retries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    fn prompt() -> GenerationPrompt {
        GenerationPrompt {
            system: "system".to_string(),
            user: "question".to_string(),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            attempt_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let generator = ScriptedGenerator::new(vec![
            Err(SvarError::OpenAI("rate limited".to_string())),
            Err(SvarError::OpenAI("overloaded".to_string())),
            Ok("answer".to_string()),
        ]);

        let answer = generate_with_retry(&generator, &prompt(), &fast_policy(3)).await.unwrap();
        assert_eq!(answer, "answer");
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let generator = ScriptedGenerator::new(vec![
            Err(SvarError::OpenAI("down".to_string())),
            Err(SvarError::OpenAI("down".to_string())),
            Err(SvarError::OpenAI("down".to_string())),
        ]);

        let err = generate_with_retry(&generator, &prompt(), &fast_policy(1)).await.unwrap_err();
        assert!(matches!(err, SvarError::Generation(_)));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let generator = ScriptedGenerator::new(vec![Err(SvarError::InvalidInput("bad prompt".to_string()))]);

        let err = generate_with_retry(&generator, &prompt(), &fast_policy(5)).await.unwrap_err();
        assert!(matches!(err, SvarError::Generation(_)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out_and_retries() {
        let generator = ScriptedGenerator::new(vec![Ok("late".to_string()), Ok("on time".to_string())])
            .with_first_delay(Duration::from_secs(5));

        let answer = generate_with_retry(&generator, &prompt(), &fast_policy(2)).await.unwrap();
        assert_eq!(answer, "on time");
    }
}
