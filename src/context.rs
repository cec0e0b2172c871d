use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline for a single service call.
///
/// Every call that talks to the CA or a DNS provider is run through
/// [`CallContext::run`], so a caller can abandon a long running issuance.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
  cancel: CancellationToken,
  deadline: Option<Instant>,
}

impl CallContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  pub fn with_timeout(self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  pub fn cancellation_token(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Fails fast if the context is already cancelled or expired.
  pub fn check(&self) -> Result<(), Error> {
    if self.cancel.is_cancelled() {
      return Err(Error::Cancelled);
    }
    match self.deadline {
      Some(deadline) if deadline <= Instant::now() => {
        Err(Error::DeadlineExceeded)
      }
      _ => Ok(()),
    }
  }

  /// Runs `fut` until it completes, the token is cancelled or the deadline
  /// passes, whichever happens first.
  pub async fn run<F, T>(&self, fut: F) -> Result<T, Error>
  where
    F: Future<Output = Result<T, Error>>,
  {
    self.check()?;

    let deadline = async {
      match self.deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
      }
    };

    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(Error::Cancelled),
      _ = deadline => Err(Error::DeadlineExceeded),
      res = fut => res,
    }
  }
}
