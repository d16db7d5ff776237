//! Out-of-band delivery of password reset secrets.

use std::sync::Mutex;

use async_trait::async_trait;

/// Delivers a plaintext reset secret to the account owner.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_token(&self, email: &str, token: &str) -> Result<(), anyhow::Error>;
}

/// Development notifier: writes the reset token to the log.
#[derive(Clone, Default)]
pub struct LogResetNotifier;

#[async_trait]
impl ResetNotifier for LogResetNotifier {
    async fn send_reset_token(&self, email: &str, token: &str) -> Result<(), anyhow::Error> {
        tracing::info!(email = %email, reset_token = %token, "Password reset token generated");
        Ok(())
    }
}

/// Captures `(email, token)` pairs for tests.
#[derive(Default)]
pub struct RecordingResetNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingResetNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recent token sent to `email`.
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token)
    }
}

#[async_trait]
impl ResetNotifier for RecordingResetNotifier {
    async fn send_reset_token(&self, email: &str, token: &str) -> Result<(), anyhow::Error> {
        if self.fail {
            return Err(anyhow::anyhow!("Mail relay unavailable"));
        }
        self.sent
            .lock()
            .map_err(|e| anyhow::anyhow!("Recording notifier mutex poisoned: {}", e))?
            .push((email.to_string(), token.to_string()));
        Ok(())
    }
}
