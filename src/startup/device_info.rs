//! Device fingerprint appended to the resolved link.
//!
//! Every field has a fallback, so collection never fails. The proxy and VPN
//! flags are heuristics over environment and interface names; they catch the
//! common setups and are not a reliable detector.

use std::{env, fs, path::Path, sync::Arc};

use serde::Serialize;
use sysinfo::{Networks, System};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const DEFAULT_REGION: &str = "us";
const DEFAULT_LOCALE: &str = "en_us";
const DEFAULT_MODEL: &str = "arm64";
const UNKNOWN: &str = "unknown";
const DEFAULT_TIMEZONE: &str = "UTC";

const VPN_INTERFACE_MARKERS: [&str; 5] = ["tap", "tun", "ppp", "ipsec", "utun"];
const PROXY_VARIABLES: [&str; 6] = [
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "ALL_PROXY",
    "all_proxy",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub region: String,
    pub locale: String,
    pub model: String,
    pub device: String,
    pub version: String,
    pub proxy: bool,
    pub vpn: bool,
    pub store: String,
    pub timezone: String,
}

impl DeviceInfo {
    /// `region=..&locale=..&model=..&device=..&version=..&proxy=..&vpn=..&store=..&timezone=..`
    pub fn query_string(&self) -> String {
        [
            ("region", self.region.as_str()),
            ("locale", self.locale.as_str()),
            ("model", self.model.as_str()),
            ("device", self.device.as_str()),
            ("version", self.version.as_str()),
            ("proxy", bool_str(self.proxy)),
            ("vpn", bool_str(self.vpn)),
            ("store", self.store.as_str()),
            ("timezone", self.timezone.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Raw system facts. Implementations must not block for long; each call is cheap
/// on the host probe.
pub trait SystemProbe: Send + Sync {
    /// Locale identifier as configured, e.g. `en_US.UTF-8` or `fr-CA`.
    fn locale(&self) -> Option<String>;
    fn cpu_arch(&self) -> Option<String>;
    /// Hardware identifier such as `iPhone16,2` or a DMI product name.
    fn machine(&self) -> Option<String>;
    fn os_version(&self) -> Option<String>;
    fn interface_names(&self) -> Vec<String>;
    /// Values of the configured proxy settings, empty when none are set.
    fn proxy_settings(&self) -> Vec<String>;
    /// IANA zone identifier.
    fn timezone(&self) -> Option<String>;
}

/// Probe backed by `sysinfo` and the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl SystemProbe for HostProbe {
    fn locale(&self) -> Option<String> {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .find(|value| !value.trim().is_empty())
    }

    fn cpu_arch(&self) -> Option<String> {
        System::cpu_arch()
    }

    fn machine(&self) -> Option<String> {
        fs::read_to_string("/sys/devices/virtual/dmi/id/product_name")
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .or_else(System::name)
    }

    fn os_version(&self) -> Option<String> {
        System::os_version()
    }

    fn interface_names(&self) -> Vec<String> {
        let networks = Networks::new_with_refreshed_list();
        networks.list().keys().cloned().collect()
    }

    fn proxy_settings(&self) -> Vec<String> {
        PROXY_VARIABLES
            .iter()
            .filter_map(|key| env::var(key).ok())
            .collect()
    }

    fn timezone(&self) -> Option<String> {
        if let Some(tz) = env::var("TZ").ok().map(|tz| tz.trim_start_matches(':').to_string()) {
            if !tz.is_empty() {
                return Some(tz);
            }
        }

        if let Ok(contents) = fs::read_to_string("/etc/timezone") {
            let zone = contents.trim();
            if !zone.is_empty() {
                return Some(zone.to_string());
            }
        }

        let target = fs::read_link(Path::new("/etc/localtime")).ok()?;
        let target = target.to_string_lossy();
        target
            .split_once("zoneinfo/")
            .map(|(_, zone)| zone.to_string())
    }
}

pub struct DeviceInfoCollector {
    probe: Arc<dyn SystemProbe>,
    storefront: Option<String>,
}

impl DeviceInfoCollector {
    pub fn new(probe: Arc<dyn SystemProbe>, storefront: Option<String>) -> Self {
        Self { probe, storefront }
    }

    pub fn host(storefront: Option<String>) -> Self {
        Self::new(Arc::new(HostProbe), storefront)
    }

    /// Gathers the fingerprint off the async runtime; falls back to defaults if the
    /// probe task itself fails.
    pub async fn collect(&self) -> DeviceInfo {
        let probe = Arc::clone(&self.probe);
        let storefront = self.storefront.clone();

        match tokio::task::spawn_blocking(move || build_info(probe.as_ref(), storefront)).await {
            Ok(info) => info,
            Err(err) => {
                log_warn!("device info probe failed: {err}");
                fallback_info(self.storefront.clone())
            }
        }
    }
}

fn build_info(probe: &dyn SystemProbe, storefront: Option<String>) -> DeviceInfo {
    let (locale, region) = match probe.locale().as_deref().and_then(parse_locale) {
        Some(parsed) => parsed,
        None => (DEFAULT_LOCALE.to_string(), None),
    };
    let region = region.unwrap_or_else(|| DEFAULT_REGION.to_string());

    let model = probe
        .cpu_arch()
        .map(|arch| normalize_arch(&arch))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let device = probe
        .machine()
        .map(|machine| machine.replace(',', "."))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let version = probe
        .os_version()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let store = store_code(storefront, &region);

    let timezone = probe
        .timezone()
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

    DeviceInfo {
        region,
        locale,
        model,
        device,
        version,
        proxy: is_proxy_configured(&probe.proxy_settings()),
        vpn: looks_like_vpn(&probe.interface_names()),
        store,
        timezone,
    }
}

fn fallback_info(storefront: Option<String>) -> DeviceInfo {
    DeviceInfo {
        region: DEFAULT_REGION.into(),
        locale: DEFAULT_LOCALE.into(),
        model: DEFAULT_MODEL.into(),
        device: UNKNOWN.into(),
        version: UNKNOWN.into(),
        proxy: false,
        vpn: false,
        store: store_code(storefront, DEFAULT_REGION),
        timezone: DEFAULT_TIMEZONE.into(),
    }
}

/// Lowercased storefront country, or `region` when none is known.
fn store_code(storefront: Option<String>, region: &str) -> String {
    storefront
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| region.to_string())
}

/// Normalizes `en-US.UTF-8@euro` style identifiers to `en_us` and extracts the
/// region subtag (`us`). `C`/`POSIX` carry no locale information.
pub fn parse_locale(raw: &str) -> Option<(String, Option<String>)> {
    let identifier = raw
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim()
        .replace('-', "_");

    if identifier.is_empty() || identifier == "C" || identifier == "POSIX" {
        return None;
    }

    let region = identifier
        .split('_')
        .skip(1)
        .filter(|part| {
            (part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
                || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit()))
        })
        .last()
        .map(str::to_lowercase);

    Some((identifier.to_lowercase(), region))
}

fn normalize_arch(arch: &str) -> String {
    match arch {
        "aarch64" => "arm64".to_string(),
        other => other.to_string(),
    }
}

pub fn looks_like_vpn(interface_names: &[String]) -> bool {
    interface_names.iter().any(|name| {
        let name = name.to_lowercase();
        VPN_INTERFACE_MARKERS
            .iter()
            .any(|marker| name.contains(marker))
    })
}

pub fn is_proxy_configured(settings: &[String]) -> bool {
    settings.iter().any(|value| {
        let value = value.trim();
        !value.is_empty()
            && !value.eq_ignore_ascii_case("direct")
            && !value.eq_ignore_ascii_case("none")
    })
}
