use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::domain::ports::NotificationChannel;
use crate::domain::user::User;
use crate::error::Result;

/// Simulated email sender: logs the delivery instead of talking to a
/// mail server. An unavailable channel declines delivery with
/// `Ok(false)` rather than erroring.
pub struct EmailChannel {
    available: AtomicBool,
}

impl EmailChannel {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl Default for EmailChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, user: &User, message: &str, urgent: bool) -> Result<bool> {
        if !self.available.load(Ordering::Acquire) {
            warn!(user = %user.id, "email channel offline");
            return Ok(false);
        }
        info!(
            to = %user.email,
            urgent,
            "[email] {}: {}",
            user.name,
            message
        );
        Ok(true)
    }
}

/// Simulated SMS sender. Users without a phone number on file cannot be
/// reached here.
pub struct SmsChannel {
    available: AtomicBool,
}

impl SmsChannel {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl Default for SmsChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    async fn send(&self, user: &User, message: &str, urgent: bool) -> Result<bool> {
        if !self.available.load(Ordering::Acquire) {
            warn!(user = %user.id, "sms channel offline");
            return Ok(false);
        }
        let Some(phone) = user.phone.as_deref() else {
            warn!(user = %user.id, "no phone number on file");
            return Ok(false);
        };
        info!(to = phone, urgent, "[sms] {}: {}", user.name, message);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new("U001", "Alice Chen", "alice@example.com")
    }

    #[tokio::test]
    async fn test_email_delivery_flag() {
        let channel = EmailChannel::new();
        assert!(channel.send(&alice(), "hello", false).await.unwrap());

        channel.set_available(false);
        assert!(!channel.send(&alice(), "hello", false).await.unwrap());
    }

    #[tokio::test]
    async fn test_sms_requires_phone() {
        let channel = SmsChannel::new();
        assert!(!channel.send(&alice(), "hello", true).await.unwrap());

        let with_phone = alice().with_phone("555-0101");
        assert!(channel.send(&with_phone, "hello", true).await.unwrap());
    }
}
