//! Caller-supplied deadlines for calls that may block on external I/O.

use crate::error::TokenError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Point in time after which a pending store call is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Drive `fut` to completion or fail with [`TokenError::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns the future's own error, or `Timeout` when the deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, TokenError>
    where
        F: Future<Output = Result<T, TokenError>>,
    {
        match timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(TokenError::Timeout(self.budget)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_within_budget() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let value = deadline.run(async { Ok::<_, TokenError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let result = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, TokenError>(())
            })
            .await;
        assert!(matches!(result, Err(TokenError::Timeout(_))));
        assert!(deadline.is_elapsed());
    }
}
