use std::{env, time::Duration};

/// Remote assets and SDK keys used by the first-launch flow.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Image whose embedded description carries the base link.
    pub title_image_url: String,
    pub attribution_dev_key: String,
    pub attribution_app_id: String,
    /// Empty disables the push branch.
    pub push_app_id: String,
    /// Store country override; the device region is used when absent.
    pub storefront: Option<String>,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            title_image_url:
                "https://github.com/DannyOceanGamesTest/dogt/blob/main/IconTitle.jpg?raw=true"
                    .into(),
            attribution_dev_key: "hewwVhT8ZaCvQfTjGi66ME".into(),
            attribution_app_id: "6749445226".into(),
            push_app_id: "25b49bc3-5c13-479c-ab7b-a8ccb2d3d232".into(),
            storefront: None,
            http_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(100),
            poll_attempts: 50,
        }
    }
}

impl StartupConfig {
    /// Defaults overridden by `READINGCOACH_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("READINGCOACH_TITLE_IMAGE_URL") {
            self.title_image_url = url;
        }
        if let Some(key) = lookup("READINGCOACH_ATTRIBUTION_DEV_KEY") {
            self.attribution_dev_key = key;
        }
        if let Some(id) = lookup("READINGCOACH_ATTRIBUTION_APP_ID") {
            self.attribution_app_id = id;
        }
        if let Some(id) = lookup("READINGCOACH_PUSH_APP_ID") {
            self.push_app_id = id;
        }
        if let Some(store) = lookup("READINGCOACH_STOREFRONT").filter(|s| !s.trim().is_empty()) {
            self.storefront = Some(store.trim().to_lowercase());
        }
        if let Some(secs) = lookup("READINGCOACH_HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.http_timeout = Duration::from_secs(secs);
        }
        self
    }
}
