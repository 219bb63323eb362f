//! First-launch link resolution and the SDK adapters it drives.

mod attribution;
mod config;
mod coordinator;
mod device_info;
mod image_meta;
mod poll;
mod push;
mod rate_prompt;
mod storage;

#[cfg(feature = "app")]
pub mod commands;

pub use attribution::{
    AttributionAdapter, AttributionSdk, ConversionListener, ConversionResult,
    OfflineAttributionSdk,
};
pub use config::StartupConfig;
pub use coordinator::{compose_link, StartupCoordinator, StartupOutcome, StartupRoute, StartupState};
pub use device_info::{DeviceInfo, DeviceInfoCollector, HostProbe, SystemProbe};
pub use image_meta::{description_from_image, DescriptionSource, RemoteImageDescription};
pub use poll::poll_until;
pub use push::{DisabledPushSdk, PushAdapter, PushSdk};
pub use rate_prompt::{RatePrompt, TapSource};
pub use storage::LinkStore;
