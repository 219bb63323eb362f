//! First-launch flow that decides whether the app opens the remote menu page or
//! goes straight to the reading tracker.
//!
//! The decision is sticky: a resolved link is reused on every later launch, and
//! a remote kill-switch (a description without `/`) turns the flow off for good.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use serde::Serialize;
use tokio::sync::{watch, OnceCell};
use url::Url;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

use super::{
    attribution::{AttributionAdapter, OfflineAttributionSdk, ORGANIC_SUBS_QUERY},
    config::StartupConfig,
    device_info::DeviceInfoCollector,
    image_meta::{DescriptionSource, RemoteImageDescription},
    poll::poll_until,
    push::{DisabledPushSdk, PushAdapter},
    storage::LinkStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum StartupState {
    Idle,
    /// A link from an earlier launch is being reused.
    ShortCircuitSaved,
    /// The flow was permanently switched off on an earlier launch.
    ShortCircuitAlwaysApp,
    Bootstrapping,
    /// Terminal: show the web page at `url`.
    ShowingLink { url: String },
    /// Terminal: show the main interface.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StartupRoute {
    Saved,
    AlwaysApp,
    Bootstrap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupOutcome {
    pub route: StartupRoute,
    pub state: StartupState,
    /// Trimmed description read from the title image, shown on the launch screen.
    pub description: Option<String>,
    pub final_link: Option<String>,
}

impl StartupOutcome {
    pub fn web_url(&self) -> Option<&str> {
        match &self.state {
            StartupState::ShowingLink { url } => Some(url),
            _ => None,
        }
    }
}

pub struct StartupCoordinator {
    links: LinkStore,
    description_source: Arc<dyn DescriptionSource>,
    attribution: Arc<AttributionAdapter>,
    push: Arc<PushAdapter>,
    device_info: DeviceInfoCollector,
    poll_interval: Duration,
    poll_attempts: u32,
    state: watch::Sender<StartupState>,
    outcome: OnceCell<StartupOutcome>,
}

impl StartupCoordinator {
    pub fn new(
        links: LinkStore,
        description_source: Arc<dyn DescriptionSource>,
        attribution: Arc<AttributionAdapter>,
        push: Arc<PushAdapter>,
        device_info: DeviceInfoCollector,
        poll_interval: Duration,
        poll_attempts: u32,
    ) -> Self {
        let (state, _) = watch::channel(StartupState::Idle);
        Self {
            links,
            description_source,
            attribution,
            push,
            device_info,
            poll_interval,
            poll_attempts,
            state,
            outcome: OnceCell::new(),
        }
    }

    /// Wires the host collaborators: the remote title image, the host probe and
    /// the SDK stand-ins used when no vendor SDK is linked.
    pub fn from_config(config: &StartupConfig, links: LinkStore) -> Result<Self> {
        let description =
            RemoteImageDescription::new(config.title_image_url.clone(), config.http_timeout)?;
        let attribution = AttributionAdapter::new(
            Arc::new(OfflineAttributionSdk::default()),
            config.attribution_dev_key.clone(),
            config.attribution_app_id.clone(),
        );
        let push = PushAdapter::new(
            Arc::new(DisabledPushSdk),
            config.push_app_id.clone(),
            config.poll_interval,
            config.poll_attempts,
        );

        Ok(Self::new(
            links,
            Arc::new(description),
            Arc::new(attribution),
            Arc::new(push),
            DeviceInfoCollector::host(config.storefront.clone()),
            config.poll_interval,
            config.poll_attempts,
        ))
    }

    pub fn state(&self) -> StartupState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StartupState> {
        self.state.subscribe()
    }

    /// Runs the flow at most once per process. Later callers get the first outcome
    /// with its state replaced by the live one, so a closed web view stays closed.
    pub async fn resolve(&self) -> StartupOutcome {
        let mut outcome = self.outcome.get_or_init(|| self.start()).await.clone();
        outcome.state = self.state();
        outcome
    }

    /// Leaves the web page for the main interface.
    pub fn close_web_view(&self) {
        self.transition(StartupState::Ready);
    }

    pub async fn start(&self) -> StartupOutcome {
        if let Some(saved) = self.links.load_menu() {
            match Url::parse(&saved) {
                Ok(_) => {
                    log_info!("reusing saved link; skipping startup checks");
                    self.transition(StartupState::ShortCircuitSaved);
                    return self.finish(
                        StartupRoute::Saved,
                        StartupState::ShowingLink { url: saved.clone() },
                        None,
                        Some(saved),
                    );
                }
                Err(err) => log_warn!("saved link is not a valid URL ({err}); ignoring it"),
            }
        }

        if self.links.is_always_app_mode() {
            log_info!("always-app mode set; opening main interface");
            self.transition(StartupState::ShortCircuitAlwaysApp);
            return self.finish(StartupRoute::AlwaysApp, StartupState::Ready, None, None);
        }

        self.transition(StartupState::Bootstrapping);
        self.bootstrap().await
    }

    async fn bootstrap(&self) -> StartupOutcome {
        let description = self
            .description_source
            .fetch_description()
            .await
            .map(|text| text.trim().to_string());

        let Some(base) = description.clone().filter(|text| text.contains('/')) else {
            log_info!("remote description has no link; switching to always-app mode");
            if let Err(err) = self.links.set_always_app_mode(true) {
                log_error!("failed to persist always-app mode: {err:#}");
            }
            return self.finish(StartupRoute::Bootstrap, StartupState::Ready, description, None);
        };

        let push = Arc::clone(&self.push);
        let push_task =
            tokio::spawn(async move { push.request_push_then_init_if_needed().await });

        self.attribution.initialize_and_start().await;
        let install_id = self.attribution.install_id().unwrap_or_default();
        let device_query = self.device_info.collect().await.query_string();

        let subs_query = poll_until(self.poll_interval, self.poll_attempts, || {
            self.attribution.conversion()
        })
        .await
        .map(|conversion| conversion.subs_query)
        .unwrap_or_else(|| {
            log_warn!("conversion data did not arrive in time; using organic");
            ORGANIC_SUBS_QUERY.to_string()
        });

        let push_id = match push_task.await {
            Ok(id) => id.unwrap_or_default(),
            Err(err) => {
                log_error!("push branch failed: {err}");
                String::new()
            }
        };

        let link = compose_link(&base, &subs_query, &install_id, &push_id, &device_query);

        match Url::parse(&link) {
            Ok(_) => {
                match self.links.save_menu(&link) {
                    Ok(()) => log_info!("resolved link persisted"),
                    Err(err) => log_error!("failed to persist resolved link: {err:#}"),
                }
                self.finish(
                    StartupRoute::Bootstrap,
                    StartupState::ShowingLink { url: link.clone() },
                    description,
                    Some(link),
                )
            }
            Err(err) => {
                log_warn!("composed link is not a valid URL ({err}); opening main interface");
                self.finish(StartupRoute::Bootstrap, StartupState::Ready, description, None)
            }
        }
    }

    fn transition(&self, next: StartupState) {
        self.state.send_replace(next);
    }

    fn finish(
        &self,
        route: StartupRoute,
        state: StartupState,
        description: Option<String>,
        final_link: Option<String>,
    ) -> StartupOutcome {
        self.transition(state.clone());
        StartupOutcome {
            route,
            state,
            description,
            final_link,
        }
    }
}

/// `base?subs[&af_id=..][&os_id=..][&device..]`; empty ids and an empty device
/// query are left out entirely.
pub fn compose_link(
    base: &str,
    subs_query: &str,
    install_id: &str,
    push_id: &str,
    device_query: &str,
) -> String {
    let mut parts = vec![subs_query.to_string()];
    if !install_id.is_empty() {
        parts.push(format!("af_id={install_id}"));
    }
    if !push_id.is_empty() {
        parts.push(format!("os_id={push_id}"));
    }
    if !device_query.is_empty() {
        parts.push(device_query.to_string());
    }
    format!("{base}?{}", parts.join("&"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::{
        prefs::PreferenceStore,
        startup::{
            attribution::test_support::ScriptedAttributionSdk,
            device_info::test_support::StaticProbe,
            push::test_support::ScriptedPushSdk,
            storage::{ALWAYS_APP_MODE_KEY, LEGACY_MENU_KEY, MENU_KEY},
        },
    };

    const INTERVAL: Duration = Duration::from_millis(100);

    struct FixedDescription {
        text: Option<String>,
        calls: AtomicUsize,
    }

    impl FixedDescription {
        fn new(text: Option<&str>) -> Self {
            Self {
                text: text.map(str::to_owned),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DescriptionSource for FixedDescription {
        async fn fetch_description(&self) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text.clone()
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        prefs: Arc<PreferenceStore>,
        description: Arc<FixedDescription>,
        attribution: Arc<ScriptedAttributionSdk>,
        push: Arc<ScriptedPushSdk>,
        probe: Arc<StaticProbe>,
        coordinator: StartupCoordinator,
    }

    fn harness(
        description: Option<&str>,
        attribution: ScriptedAttributionSdk,
        push: ScriptedPushSdk,
    ) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs =
            Arc::new(PreferenceStore::new(dir.path().join("preferences.json")).expect("prefs"));
        let description = Arc::new(FixedDescription::new(description));
        let attribution = Arc::new(attribution);
        let push = Arc::new(push);
        let probe = Arc::new(StaticProbe {
            locale: Some("en_US.UTF-8".into()),
            ..StaticProbe::default()
        });

        let coordinator = StartupCoordinator::new(
            LinkStore::new(prefs.clone()),
            description.clone(),
            Arc::new(AttributionAdapter::new(
                attribution.clone(),
                "dev-key".into(),
                "app-id".into(),
            )),
            Arc::new(PushAdapter::new(push.clone(), "push-app".into(), INTERVAL, 50)),
            DeviceInfoCollector::new(probe.clone(), None),
            INTERVAL,
            50,
        );

        Harness {
            dir,
            prefs,
            description,
            attribution,
            push,
            probe,
            coordinator,
        }
    }

    fn quiet_harness(description: Option<&str>) -> Harness {
        harness(
            description,
            ScriptedAttributionSdk::organic(Duration::ZERO),
            ScriptedPushSdk::new(false, None, 0),
        )
    }

    const DEVICE_QUERY: &str = "region=us&locale=en_us&model=arm64&device=iPhone16.2\
        &version=17.5&proxy=false&vpn=false&store=us&timezone=Europe/Paris";

    #[test]
    fn compose_omits_empty_segments() {
        assert_eq!(
            compose_link(
                "https://x.test/menu",
                "sub1=organic",
                "",
                "",
                "region=us&locale=en_us"
            ),
            "https://x.test/menu?sub1=organic&region=us&locale=en_us"
        );
        assert_eq!(
            compose_link("https://x.test/menu", "sub1=a&sub2=b", "af1", "os1", ""),
            "https://x.test/menu?sub1=a&sub2=b&af_id=af1&os_id=os1"
        );
    }

    #[tokio::test]
    async fn saved_link_skips_all_collaborators() {
        let h = quiet_harness(Some("https://x.test/menu"));
        h.prefs.set(MENU_KEY, "https://saved.test/menu?sub1=organic").expect("set");

        let outcome = h.coordinator.start().await;

        assert_eq!(outcome.route, StartupRoute::Saved);
        assert_eq!(outcome.web_url(), Some("https://saved.test/menu?sub1=organic"));
        assert_eq!(h.description.calls(), 0);
        assert_eq!(h.attribution.calls(), 0);
        assert_eq!(h.push.calls(), 0);
        assert_eq!(h.probe.calls(), 0);
    }

    #[tokio::test]
    async fn legacy_saved_link_is_migrated_and_used() {
        let h = quiet_harness(None);
        h.prefs.set(LEGACY_MENU_KEY, "https://old.test/menu").expect("set");

        let outcome = h.coordinator.start().await;

        assert_eq!(outcome.web_url(), Some("https://old.test/menu"));
        assert_eq!(h.prefs.get_string(MENU_KEY).as_deref(), Some("https://old.test/menu"));
        assert!(!h.prefs.contains(LEGACY_MENU_KEY));
    }

    #[tokio::test]
    async fn always_app_mode_goes_straight_to_ready() {
        let h = quiet_harness(Some("https://x.test/menu"));
        h.prefs.set(ALWAYS_APP_MODE_KEY, true).expect("set");

        let outcome = h.coordinator.start().await;

        assert_eq!(outcome.route, StartupRoute::AlwaysApp);
        assert_eq!(outcome.state, StartupState::Ready);
        assert_eq!(h.description.calls(), 0);
        assert_eq!(h.attribution.calls(), 0);
        assert_eq!(h.push.calls(), 0);
    }

    #[tokio::test]
    async fn description_without_slash_disables_flow_forever() {
        let h = quiet_harness(Some("  maintenance  "));

        let outcome = h.coordinator.start().await;

        assert_eq!(outcome.state, StartupState::Ready);
        assert_eq!(outcome.description.as_deref(), Some("maintenance"));
        assert!(h.prefs.get_bool(ALWAYS_APP_MODE_KEY));
        assert!(!h.prefs.contains(MENU_KEY));
        assert_eq!(h.attribution.calls(), 0);
        assert_eq!(h.push.calls(), 0);
    }

    #[tokio::test]
    async fn missing_description_disables_flow() {
        let h = quiet_harness(None);
        let outcome = h.coordinator.start().await;
        assert_eq!(outcome.state, StartupState::Ready);
        assert!(h.prefs.get_bool(ALWAYS_APP_MODE_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn organic_install_without_ids_composes_minimal_link() {
        let h = quiet_harness(Some("https://x.test/menu"));

        let outcome = h.coordinator.start().await;

        let expected = format!("https://x.test/menu?sub1=organic&{DEVICE_QUERY}");
        assert_eq!(outcome.route, StartupRoute::Bootstrap);
        assert_eq!(outcome.web_url(), Some(expected.as_str()));
        assert_eq!(outcome.final_link.as_deref(), Some(expected.as_str()));
        assert_eq!(h.prefs.get_string(MENU_KEY).as_deref(), Some(expected.as_str()));
        assert_eq!(h.probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_link_carries_campaign_and_ids() {
        let h = harness(
            Some("https://x.test/menu"),
            ScriptedAttributionSdk::new(
                Some("af-9"),
                Some(json!({ "af_status": "Non-organic", "campaign": "fb_summer" })),
                Duration::from_millis(1200),
            ),
            ScriptedPushSdk::new(true, Some("os-7"), 20),
        );

        let outcome = h.coordinator.start().await;

        let expected = format!(
            "https://x.test/menu?sub1=fb&sub2=summer&af_id=af-9&os_id=os-7&{DEVICE_QUERY}"
        );
        assert_eq!(outcome.web_url(), Some(expected.as_str()));
        assert_eq!(h.push.tags(), vec![("player_status".into(), "target".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn branches_run_concurrently_within_their_own_bounds() {
        // Neither branch ever produces a value: both hit their 5s bound.
        let h = harness(
            Some("https://x.test/menu"),
            ScriptedAttributionSdk::new(None, None, Duration::ZERO),
            ScriptedPushSdk::new(true, None, 0),
        );
        let started = Instant::now();

        let outcome = h.coordinator.start().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6), "branches ran serially: {elapsed:?}");
        let expected = format!("https://x.test/menu?sub1=organic&{DEVICE_QUERY}");
        assert_eq!(outcome.web_url(), Some(expected.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_link_falls_back_to_ready_without_persisting() {
        let h = quiet_harness(Some("not a url/at all"));

        let outcome = h.coordinator.start().await;

        assert_eq!(outcome.state, StartupState::Ready);
        assert!(outcome.final_link.is_none());
        assert!(!h.prefs.contains(MENU_KEY));
        assert!(!h.prefs.get_bool(ALWAYS_APP_MODE_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn second_launch_reuses_persisted_link() {
        let h = quiet_harness(Some("https://x.test/menu"));
        let first = h.coordinator.start().await;

        let again = h.coordinator.start().await;

        assert_eq!(again.route, StartupRoute::Saved);
        assert_eq!(again.web_url(), first.web_url());
        assert_eq!(h.description.calls(), 1);
        assert_eq!(h.attribution.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_runs_once_and_publishes_state() {
        let h = quiet_harness(Some("https://x.test/menu"));
        let mut updates = h.coordinator.subscribe();
        assert_eq!(h.coordinator.state(), StartupState::Idle);

        let first = h.coordinator.resolve().await;
        let second = h.coordinator.resolve().await;

        assert_eq!(first, second);
        assert_eq!(h.description.calls(), 1);
        assert!(updates.has_changed().expect("sender alive"));
        assert_eq!(
            *updates.borrow_and_update(),
            StartupState::ShowingLink {
                url: first.final_link.clone().expect("link")
            }
        );

        h.coordinator.close_web_view();
        assert_eq!(h.coordinator.state(), StartupState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_web_view_sticks_across_resolves() {
        let h = quiet_harness(Some("https://x.test/menu"));

        let first = h.coordinator.resolve().await;
        assert!(first.web_url().is_some());

        h.coordinator.close_web_view();
        let again = h.coordinator.resolve().await;

        assert_eq!(again.state, StartupState::Ready);
        assert_eq!(again.web_url(), None);
        assert_eq!(again.final_link, first.final_link);
        assert_eq!(h.description.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_push_branch_leaves_os_id_out() {
        let h = harness(
            Some("https://x.test/menu"),
            ScriptedAttributionSdk::organic(Duration::ZERO),
            ScriptedPushSdk::panicking(),
        );

        let outcome = h.coordinator.start().await;

        let expected = format!("https://x.test/menu?sub1=organic&{DEVICE_QUERY}");
        assert_eq!(outcome.web_url(), Some(expected.as_str()));
        assert_eq!(h.push.calls(), 1);
        assert!(h.push.tags().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unwritable_preferences_still_show_the_link() {
        let h = quiet_harness(Some("https://x.test/menu"));
        // A directory where the file should be makes every write fail.
        let prefs_path = h.dir.path().join("preferences.json");
        std::fs::create_dir(&prefs_path).expect("block preferences file");

        let outcome = h.coordinator.start().await;

        let expected = format!("https://x.test/menu?sub1=organic&{DEVICE_QUERY}");
        assert_eq!(outcome.web_url(), Some(expected.as_str()));
        assert_eq!(
            h.coordinator.state(),
            StartupState::ShowingLink { url: expected }
        );
        assert!(prefs_path.is_dir());
    }
}
