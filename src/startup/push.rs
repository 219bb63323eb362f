use std::{sync::Arc, sync::OnceLock, time::Duration};

use async_trait::async_trait;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

use super::poll::poll_until;

const SUBSCRIBER_TAG: (&str, &str) = ("player_status", "target");

/// Push-notification SDK surface the adapter drives.
#[async_trait]
pub trait PushSdk: Send + Sync {
    /// Asks the OS for alert/badge/sound permission.
    async fn request_permission(&self) -> bool;
    fn initialize(&self, app_id: &str);
    /// Subscriber id once the SDK has registered with its backend.
    fn subscription_id(&self) -> Option<String>;
    fn add_tag(&self, key: &str, value: &str);
}

pub struct PushAdapter {
    sdk: Arc<dyn PushSdk>,
    app_id: String,
    poll_interval: Duration,
    poll_attempts: u32,
    subscriber_id: OnceLock<String>,
}

impl PushAdapter {
    pub fn new(
        sdk: Arc<dyn PushSdk>,
        app_id: String,
        poll_interval: Duration,
        poll_attempts: u32,
    ) -> Self {
        Self {
            sdk,
            app_id,
            poll_interval,
            poll_attempts,
            subscriber_id: OnceLock::new(),
        }
    }

    /// Requests permission, initializes the SDK and waits (bounded) for a subscriber id.
    /// Denied permission, a missing app id or a timeout all yield `None`.
    pub async fn request_push_then_init_if_needed(&self) -> Option<String> {
        if !self.sdk.request_permission().await {
            log_info!("push permission denied");
            return None;
        }

        if self.app_id.is_empty() {
            log_info!("push app id not configured; skipping push init");
            return None;
        }

        self.sdk.initialize(&self.app_id);

        let sdk = Arc::clone(&self.sdk);
        let id = poll_until(self.poll_interval, self.poll_attempts, move || {
            sdk.subscription_id().filter(|id| !id.is_empty())
        })
        .await;

        match id {
            Some(id) => {
                self.sdk.add_tag(SUBSCRIBER_TAG.0, SUBSCRIBER_TAG.1);
                let _ = self.subscriber_id.set(id.clone());
                log_info!("push subscriber id assigned");
                Some(id)
            }
            None => {
                log_warn!("push subscriber id not assigned within the polling window");
                None
            }
        }
    }

    pub fn subscriber_id(&self) -> Option<String> {
        self.subscriber_id.get().cloned()
    }
}

/// Stand-in for builds without a push SDK: permission is never granted.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPushSdk;

#[async_trait]
impl PushSdk for DisabledPushSdk {
    async fn request_permission(&self) -> bool {
        false
    }

    fn initialize(&self, _app_id: &str) {}

    fn subscription_id(&self) -> Option<String> {
        None
    }

    fn add_tag(&self, _key: &str, _value: &str) {}
}
