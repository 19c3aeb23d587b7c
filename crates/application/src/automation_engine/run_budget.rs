use std::future::Future;
use std::time::Duration;

use corvid_core::{AppError, AppResult};
use tokio::time::Instant;

/// Deadline shared by every step of one rule-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBudget {
    deadline: Instant,
}

impl RunBudget {
    /// Creates a budget that expires at `deadline`.
    #[must_use]
    pub fn until(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// Creates a budget that expires `duration` from now.
    #[must_use]
    pub fn after(duration: Duration) -> Self {
        Self::until(Instant::now() + duration)
    }

    /// Returns whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Fails with a timeout when the deadline has already passed.
    pub fn ensure_remaining(&self, stage: &str) -> AppResult<()> {
        if self.is_expired() {
            return Err(Self::exceeded(stage));
        }

        Ok(())
    }

    /// Awaits `future` until the deadline.
    ///
    /// The underlying operation may still complete after the caller stops waiting.
    pub async fn bound<T, F>(&self, stage: &str, future: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout_at(self.deadline, future).await {
            Ok(result) => result,
            Err(_) => Err(Self::exceeded(stage)),
        }
    }

    fn exceeded(stage: &str) -> AppError {
        AppError::Timeout(format!("{stage} exceeded the rule-run deadline"))
    }
}
