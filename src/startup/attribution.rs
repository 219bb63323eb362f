use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const ORGANIC_SUBS_QUERY: &str = "sub1=organic";

/// Campaign attribution for this install, derived from the SDK's conversion payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub raw_campaign: Option<String>,
    /// `sub1=..&sub2=..` built from the campaign, or `sub1=organic`.
    pub subs_query: String,
    pub status: Option<String>,
}

impl ConversionResult {
    /// Builds the result from the SDK's conversion data (`af_status`, `campaign`).
    pub fn from_conversion_data(data: &Map<String, Value>) -> Self {
        let status = data
            .get("af_status")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let campaign = data
            .get("campaign")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Self {
            subs_query: subs_query(campaign.as_deref(), status.as_deref()),
            raw_campaign: campaign,
            status,
        }
    }

    pub fn organic() -> Self {
        Self {
            raw_campaign: None,
            subs_query: ORGANIC_SUBS_QUERY.to_string(),
            status: None,
        }
    }
}

/// Maps `val1_val2_val3` to `sub1=val1&sub2=val2&sub3=val3` for non-organic installs.
pub fn subs_query(campaign: Option<&str>, status: Option<&str>) -> String {
    let non_organic = status.is_some_and(|s| s.eq_ignore_ascii_case("non-organic"));
    let Some(campaign) = campaign.filter(|c| non_organic && !c.is_empty()) else {
        return ORGANIC_SUBS_QUERY.to_string();
    };

    let parts: Vec<String> = campaign
        .split('_')
        .filter(|part| !part.is_empty())
        .enumerate()
        .map(|(index, value)| format!("sub{}={value}", index + 1))
        .collect();

    if parts.is_empty() {
        ORGANIC_SUBS_QUERY.to_string()
    } else {
        parts.join("&")
    }
}

/// Handle the SDK calls back into once conversion data is known.
///
/// Only the first callback counts; later ones are ignored.
#[derive(Clone)]
pub struct ConversionListener {
    slot: Arc<OnceLock<ConversionResult>>,
}

impl ConversionListener {
    pub fn on_conversion_data_success(&self, data: &Map<String, Value>) {
        let result = ConversionResult::from_conversion_data(data);
        log_info!(
            "conversion data received: status={:?} subs={}",
            result.status,
            result.subs_query
        );
        self.record(result);
    }

    pub fn on_conversion_data_fail(&self, error: &str) {
        log_warn!("conversion data failed: {error}; treating install as organic");
        self.record(ConversionResult::organic());
    }

    fn record(&self, result: ConversionResult) {
        if self.slot.set(result).is_err() {
            log_warn!("conversion data already recorded; ignoring repeat callback");
        }
    }
}

/// Install-attribution SDK surface the adapter drives.
#[async_trait]
pub trait AttributionSdk: Send + Sync {
    fn configure(&self, dev_key: &str, app_id: &str);
    fn set_listener(&self, listener: ConversionListener);
    /// Starts the SDK. Conversion data arrives later through the listener.
    async fn start(&self);
    fn install_id(&self) -> Option<String>;
}

/// Owns the attribution SDK for one launch and the values it produces.
pub struct AttributionAdapter {
    sdk: Arc<dyn AttributionSdk>,
    dev_key: String,
    app_id: String,
    install_id: OnceLock<Option<String>>,
    conversion: Arc<OnceLock<ConversionResult>>,
}

impl AttributionAdapter {
    pub fn new(sdk: Arc<dyn AttributionSdk>, dev_key: String, app_id: String) -> Self {
        Self {
            sdk,
            dev_key,
            app_id,
            install_id: OnceLock::new(),
            conversion: Arc::new(OnceLock::new()),
        }
    }

    pub async fn initialize_and_start(&self) {
        self.sdk.configure(&self.dev_key, &self.app_id);
        self.sdk.set_listener(ConversionListener {
            slot: Arc::clone(&self.conversion),
        });
        self.sdk.start().await;

        let install_id = self.sdk.install_id().filter(|id| !id.is_empty());
        log_info!("attribution started, install id present: {}", install_id.is_some());
        let _ = self.install_id.set(install_id);
    }

    pub fn install_id(&self) -> Option<String> {
        self.install_id.get().cloned().flatten()
    }

    /// `None` until the SDK has called back.
    pub fn conversion(&self) -> Option<ConversionResult> {
        self.conversion.get().cloned()
    }
}

/// Stand-in for builds without a linked attribution SDK: no install id, and the
/// conversion callback reports failure so the install resolves as organic.
#[derive(Default)]
pub struct OfflineAttributionSdk {
    listener: Mutex<Option<ConversionListener>>,
}

#[async_trait]
impl AttributionSdk for OfflineAttributionSdk {
    fn configure(&self, _dev_key: &str, _app_id: &str) {}

    fn set_listener(&self, listener: ConversionListener) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    async fn start(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener.on_conversion_data_fail("attribution SDK not linked");
        }
    }

    fn install_id(&self) -> Option<String> {
        None
    }
}
