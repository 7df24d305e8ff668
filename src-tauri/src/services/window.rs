//! Lifecycle controller for the single primary surface.
//!
//! The controller owns all shell state: the surface reference and geometry,
//! the power mediator, the navigation policy and the second-instance
//! throttle. Host callbacks are translated into [`SurfaceEvent`]s and routed
//! through a subscription table built once at startup; every handler returns
//! the [`Effect`]s the host should run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{AppConfig, ScreenLockInhibitionMethod};
use crate::effects::{Effect, PageSignal};
use crate::services::deep_link::parse_deep_link;
use crate::services::inhibitor::ScreenLockInhibitor;
use crate::services::navigation::{NavigationPolicy, NewWindowDecision, RequestSource, RequestVerdict};
use crate::services::power::PowerStateMediator;
use crate::services::second_instance::SecondInstanceRouter;
use crate::services::window_state::WindowGeometry;

/// Clicks "Join on the web instead" on the meeting launcher page.
pub const JOIN_ON_WEB_PROBE: &str = "\
    openBrowserButton = document.querySelector('[data-tid=joinOnWeb]');\n\
    openBrowserButton && openBrowserButton.click();";

/// Clicks "Try again" on the service's error page.
pub const TRY_AGAIN_PROBE: &str = "\
    tryAgainLink = document.getElementById('try-again-link');\n\
    tryAgainLink && tryAgainLink.click();";

/// How the host should create the primary surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    /// `None` leaves position and size to the platform.
    pub geometry: Option<WindowGeometry>,
    pub user_agent: String,
    pub partition: String,
    pub icon: Option<PathBuf>,
    /// Always created hidden; startup effects decide visibility.
    pub visible: bool,
    pub devtools: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    ContentFinishedLoading,
    TitleChanged(String),
    Closed,
    RestoredFromMinimized,
    GeometryChanged {
        geometry: WindowGeometry,
        minimized: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEventKind {
    ContentFinishedLoading,
    TitleChanged,
    Closed,
    RestoredFromMinimized,
    GeometryChanged,
}

impl SurfaceEvent {
    pub fn kind(&self) -> SurfaceEventKind {
        match self {
            SurfaceEvent::ContentFinishedLoading => SurfaceEventKind::ContentFinishedLoading,
            SurfaceEvent::TitleChanged(_) => SurfaceEventKind::TitleChanged,
            SurfaceEvent::Closed => SurfaceEventKind::Closed,
            SurfaceEvent::RestoredFromMinimized => SurfaceEventKind::RestoredFromMinimized,
            SurfaceEvent::GeometryChanged { .. } => SurfaceEventKind::GeometryChanged,
        }
    }
}

/// State shared by every handler.
pub struct ShellState {
    config: Arc<AppConfig>,
    surface_open: bool,
    geometry: Option<WindowGeometry>,
    minimized: bool,
    power: PowerStateMediator,
    navigation: NavigationPolicy,
    second_instance: SecondInstanceRouter,
}

type Handler = fn(&SurfaceEvent, &mut ShellState) -> Vec<Effect>;

struct Subscription {
    kind: SurfaceEventKind,
    handler: Handler,
}

/// Result of [`ShellController::initialize`].
pub struct Startup {
    pub controller: ShellController,
    pub surface: SurfaceSpec,
    /// Run in order once the surface exists.
    pub effects: Vec<Effect>,
}

pub struct ShellController {
    state: ShellState,
    subscriptions: Vec<Subscription>,
}

impl ShellController {
    /// Builds the controller, the primary surface description and the startup
    /// effects. `args` are the process arguments, scanned for a deep link.
    pub fn initialize<S: AsRef<str>>(
        config: Arc<AppConfig>,
        args: &[S],
        restored_geometry: Option<WindowGeometry>,
        inhibitor: Box<dyn ScreenLockInhibitor>,
    ) -> Startup {
        log::info!("Initializing primary surface for {}", config.url);

        let surface = SurfaceSpec {
            geometry: restored_geometry,
            user_agent: config.chrome_user_agent.clone(),
            partition: config.partition.clone(),
            icon: config.app_icon.clone(),
            visible: false,
            devtools: config.web_debug,
        };

        let deep_link = parse_deep_link(args, &config.url);
        let effects = startup_effects(&config, deep_link);
        let subscriptions = subscriptions_for(config.screen_lock_inhibition_method);

        let state = ShellState {
            power: PowerStateMediator::new(config.screen_lock_inhibition_method, inhibitor),
            config,
            surface_open: true,
            geometry: restored_geometry,
            minimized: false,
            navigation: NavigationPolicy::new(),
            second_instance: SecondInstanceRouter::new(),
        };

        Startup {
            controller: ShellController {
                state,
                subscriptions,
            },
            surface,
            effects,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.config
    }

    pub fn shared_config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.state.config)
    }

    pub fn has_surface(&self) -> bool {
        self.state.surface_open
    }

    pub fn geometry(&self) -> Option<WindowGeometry> {
        self.state.geometry
    }

    pub fn is_on_call(&self) -> bool {
        self.state.power.is_on_call()
    }

    pub fn phantom_popups(&self) -> u32 {
        self.state.navigation.phantom_popups()
    }

    pub fn handle_event(&mut self, event: SurfaceEvent) -> Vec<Effect> {
        let restored = matches!(
            event,
            SurfaceEvent::GeometryChanged {
                minimized: false,
                ..
            }
        ) && self.state.minimized;

        let mut effects = self.dispatch(&event);
        if restored {
            effects.extend(self.dispatch(&SurfaceEvent::RestoredFromMinimized));
        }
        effects
    }

    /// `call-connected` from the page; returns whether inhibition changed.
    pub fn call_connected(&mut self) -> (bool, Vec<Effect>) {
        let transition = self.state.power.call_connected();
        let effects = transition.signal.map(Effect::SendToPage).into_iter().collect();
        (transition.changed, effects)
    }

    /// `call-disconnected` from the page; returns whether inhibition changed.
    pub fn call_disconnected(&mut self) -> (bool, Vec<Effect>) {
        let transition = self.state.power.call_disconnected();
        let effects = transition.signal.map(Effect::SendToPage).into_iter().collect();
        (transition.changed, effects)
    }

    pub fn on_new_window(&mut self, url: &str, has_existing_contents: bool) -> NewWindowDecision {
        self.state.navigation.on_new_window(url, has_existing_contents)
    }

    /// Only phantom surfaces consult the phantom counter; the primary
    /// surface's deep links, reloads and tenant switches always proceed.
    pub fn on_before_request(&mut self, source: RequestSource, url: &str) -> RequestVerdict {
        match source {
            RequestSource::Primary => RequestVerdict::Proceed,
            RequestSource::Phantom => self.state.navigation.on_before_request(url),
        }
    }

    /// A duplicate launch; a no-op once the surface is gone.
    pub fn on_second_instance<S: AsRef<str>>(&mut self, args: &[S], now: Instant) -> Vec<Effect> {
        if !self.state.surface_open {
            return Vec::new();
        }
        let base_url = self.state.config.url.clone();
        self.state.second_instance.route(args, &base_url, now)
    }

    fn dispatch(&mut self, event: &SurfaceEvent) -> Vec<Effect> {
        let kind = event.kind();
        self.subscriptions
            .iter()
            .filter(|subscription| subscription.kind == kind)
            .flat_map(|subscription| (subscription.handler)(event, &mut self.state))
            .collect()
    }
}

fn startup_effects(config: &AppConfig, deep_link: Option<String>) -> Vec<Effect> {
    let mut effects = Vec::new();

    if config.clear_storage {
        effects.push(Effect::ClearStorage);
    }

    // A deep link always brings the surface up, even when starting minimized.
    let show = !config.minimized || deep_link.is_some();
    effects.push(Effect::LoadUrl(
        deep_link.unwrap_or_else(|| config.url.clone()),
    ));

    effects.push(Effect::ConfigureSpellCheck(
        config.spell_checker_languages.clone(),
    ));

    if config.online_offline_reload {
        effects.push(Effect::WatchConnectivity);
    }

    if let Some(path) = &config.client_cert_path {
        effects.push(Effect::ImportCertificate {
            path: path.clone(),
            password: config.client_cert_password.clone(),
        });
    }

    effects.push(if show { Effect::Show } else { Effect::Hide });

    if config.web_debug {
        effects.push(Effect::OpenDevTools);
    }

    effects
}

fn subscriptions_for(method: ScreenLockInhibitionMethod) -> Vec<Subscription> {
    let mut subscriptions = vec![
        Subscription {
            kind: SurfaceEventKind::ContentFinishedLoading,
            handler: on_content_finished_loading,
        },
        Subscription {
            kind: SurfaceEventKind::TitleChanged,
            handler: on_title_changed,
        },
        Subscription {
            kind: SurfaceEventKind::Closed,
            handler: on_closed,
        },
        Subscription {
            kind: SurfaceEventKind::GeometryChanged,
            handler: on_geometry_changed,
        },
    ];

    // OS-native inhibition survives minimize/restore on its own.
    if method == ScreenLockInhibitionMethod::WakeLockSignal {
        subscriptions.push(Subscription {
            kind: SurfaceEventKind::RestoredFromMinimized,
            handler: on_restored_from_minimized,
        });
    }

    subscriptions
}

fn on_content_finished_loading(_: &SurfaceEvent, _: &mut ShellState) -> Vec<Effect> {
    log::debug!("did-finish-load");
    vec![
        Effect::RunScript(JOIN_ON_WEB_PROBE),
        Effect::RunScript(TRY_AGAIN_PROBE),
        Effect::InjectStyles,
    ]
}

fn on_title_changed(event: &SurfaceEvent, _: &mut ShellState) -> Vec<Effect> {
    match event {
        SurfaceEvent::TitleChanged(title) => {
            vec![Effect::SendToPage(PageSignal::PageTitle(title.clone()))]
        }
        _ => Vec::new(),
    }
}

fn on_closed(_: &SurfaceEvent, state: &mut ShellState) -> Vec<Effect> {
    log::debug!("window closed");
    state.surface_open = false;
    state.power.release();
    vec![Effect::Quit]
}

fn on_restored_from_minimized(_: &SurfaceEvent, state: &mut ShellState) -> Vec<Effect> {
    if state.power.is_on_call() {
        vec![Effect::SendToPage(PageSignal::EnableWakeLock)]
    } else {
        Vec::new()
    }
}

fn on_geometry_changed(event: &SurfaceEvent, state: &mut ShellState) -> Vec<Effect> {
    let SurfaceEvent::GeometryChanged {
        geometry,
        minimized,
    } = event
    else {
        return Vec::new();
    };

    state.minimized = *minimized;
    if *minimized || !geometry.is_usable() || state.geometry == Some(*geometry) {
        return Vec::new();
    }

    state.geometry = Some(*geometry);
    vec![Effect::PersistGeometry(*geometry)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::services::inhibitor::InhibitionHandle;

    #[derive(Default)]
    struct CountingInhibitor {
        live: bool,
    }

    impl ScreenLockInhibitor for CountingInhibitor {
        fn acquire(&mut self) -> Result<InhibitionHandle> {
            self.live = true;
            Ok(InhibitionHandle::new(7))
        }

        fn is_active(&mut self, _: InhibitionHandle) -> bool {
            self.live
        }

        fn release(&mut self, _: InhibitionHandle) {
            self.live = false;
        }
    }

    fn start(config: AppConfig, args: &[&str]) -> Startup {
        ShellController::initialize(
            Arc::new(config),
            args,
            None,
            Box::new(CountingInhibitor::default()),
        )
    }

    const GEOMETRY: WindowGeometry = WindowGeometry {
        x: 10,
        y: 20,
        width: 1024,
        height: 768,
    };

    #[test]
    fn surface_spec_follows_config_and_restored_geometry() {
        let config = AppConfig {
            web_debug: true,
            ..AppConfig::default()
        };
        let startup = ShellController::initialize(
            Arc::new(config.clone()),
            &["teams-shell"],
            Some(GEOMETRY),
            Box::new(CountingInhibitor::default()),
        );

        assert_eq!(
            startup.surface,
            SurfaceSpec {
                geometry: Some(GEOMETRY),
                user_agent: config.chrome_user_agent.clone(),
                partition: config.partition.clone(),
                icon: None,
                visible: false,
                devtools: true,
            }
        );
        assert_eq!(startup.controller.geometry(), Some(GEOMETRY));
        assert_eq!(startup.effects.last(), Some(&Effect::OpenDevTools));
    }

    #[test]
    fn default_startup_loads_configured_url_and_shows() {
        let startup = start(AppConfig::default(), &["teams-shell"]);
        assert_eq!(
            startup.effects,
            vec![
                Effect::LoadUrl(crate::config::DEFAULT_URL.to_string()),
                Effect::ConfigureSpellCheck(Vec::new()),
                Effect::WatchConnectivity,
                Effect::Show,
            ]
        );
    }

    #[test]
    fn minimized_startup_hides_and_honours_optional_integrations() {
        let config = AppConfig {
            minimized: true,
            clear_storage: true,
            online_offline_reload: false,
            client_cert_path: Some(PathBuf::from("/certs/me.p12")),
            client_cert_password: Some("hunter2".into()),
            ..AppConfig::default()
        };
        let startup = start(config, &[]);
        assert_eq!(
            startup.effects,
            vec![
                Effect::ClearStorage,
                Effect::LoadUrl(crate::config::DEFAULT_URL.to_string()),
                Effect::ConfigureSpellCheck(Vec::new()),
                Effect::ImportCertificate {
                    path: PathBuf::from("/certs/me.p12"),
                    password: Some("hunter2".into()),
                },
                Effect::Hide,
            ]
        );
    }

    #[test]
    fn content_loaded_runs_probes_then_styles() {
        let mut controller = start(AppConfig::default(), &[]).controller;
        assert_eq!(
            controller.handle_event(SurfaceEvent::ContentFinishedLoading),
            vec![
                Effect::RunScript(JOIN_ON_WEB_PROBE),
                Effect::RunScript(TRY_AGAIN_PROBE),
                Effect::InjectStyles,
            ]
        );
    }

    #[test]
    fn title_is_forwarded_to_the_page() {
        let mut controller = start(AppConfig::default(), &[]).controller;
        assert_eq!(
            controller.handle_event(SurfaceEvent::TitleChanged("(2) Chat".into())),
            vec![Effect::SendToPage(PageSignal::PageTitle("(2) Chat".into()))]
        );
    }

    #[test]
    fn closing_quits_and_releases_inhibition() {
        let mut controller = start(AppConfig::default(), &[]).controller;
        assert!(controller.call_connected().0);

        assert_eq!(controller.handle_event(SurfaceEvent::Closed), vec![Effect::Quit]);
        assert!(!controller.has_surface());
        assert!(!controller.state.power.is_inhibited());
    }

    #[test]
    fn geometry_changes_persist_only_while_not_minimized() {
        let mut controller = start(AppConfig::default(), &[]).controller;

        assert_eq!(
            controller.handle_event(SurfaceEvent::GeometryChanged {
                geometry: GEOMETRY,
                minimized: false,
            }),
            vec![Effect::PersistGeometry(GEOMETRY)]
        );
        assert!(controller
            .handle_event(SurfaceEvent::GeometryChanged {
                geometry: GEOMETRY,
                minimized: false,
            })
            .is_empty());
        assert!(controller
            .handle_event(SurfaceEvent::GeometryChanged {
                geometry: WindowGeometry {
                    width: 0,
                    height: 0,
                    ..GEOMETRY
                },
                minimized: true,
            })
            .is_empty());
        assert_eq!(controller.geometry(), Some(GEOMETRY));
    }

    fn minimize_then_restore(controller: &mut ShellController) -> Vec<Effect> {
        controller.handle_event(SurfaceEvent::GeometryChanged {
            geometry: GEOMETRY,
            minimized: true,
        });
        controller.handle_event(SurfaceEvent::GeometryChanged {
            geometry: GEOMETRY,
            minimized: false,
        })
    }

    #[test]
    fn restore_rearms_wake_lock_signal_during_a_call() {
        let config = AppConfig {
            screen_lock_inhibition_method: ScreenLockInhibitionMethod::WakeLockSignal,
            ..AppConfig::default()
        };
        let mut controller = start(config, &[]).controller;

        assert!(minimize_then_restore(&mut controller)
            .iter()
            .all(|effect| !matches!(effect, Effect::SendToPage(_))));

        let (changed, effects) = controller.call_connected();
        assert!(changed);
        assert_eq!(effects, vec![Effect::SendToPage(PageSignal::EnableWakeLock)]);

        assert!(minimize_then_restore(&mut controller)
            .contains(&Effect::SendToPage(PageSignal::EnableWakeLock)));
    }

    #[test]
    fn focus_sampled_restore_without_geometry_change_rearms_wake_lock() {
        let config = AppConfig {
            screen_lock_inhibition_method: ScreenLockInhibitionMethod::WakeLockSignal,
            ..AppConfig::default()
        };
        let mut controller = start(config, &[]).controller;
        let moved = SurfaceEvent::GeometryChanged {
            geometry: GEOMETRY,
            minimized: false,
        };
        assert_eq!(controller.handle_event(moved.clone()), vec![Effect::PersistGeometry(GEOMETRY)]);
        let _ = controller.call_connected();

        // Iconify keeps the frame where it was; only the minimized flag flips.
        assert!(controller
            .handle_event(SurfaceEvent::GeometryChanged {
                geometry: GEOMETRY,
                minimized: true,
            })
            .is_empty());
        assert_eq!(
            controller.handle_event(moved.clone()),
            vec![Effect::SendToPage(PageSignal::EnableWakeLock)]
        );
        assert!(controller.handle_event(moved).is_empty());
    }

    #[test]
    fn primary_requests_never_consume_phantoms() {
        let mut controller = start(AppConfig::default(), &[]).controller;
        let _ = controller.on_new_window("about:blank", true);
        let link = "https://teams.microsoft.com/l/meetup-join/19:abc";

        assert_eq!(
            controller.on_before_request(RequestSource::Primary, link),
            RequestVerdict::Proceed
        );
        assert_eq!(controller.phantom_popups(), 1);
        assert_eq!(
            controller.on_before_request(RequestSource::Phantom, "https://docs.example.com/a"),
            RequestVerdict::Cancel(vec![Effect::OpenExternal("https://docs.example.com/a".to_string())])
        );
        assert_eq!(controller.phantom_popups(), 0);
    }

    #[test]
    fn restore_does_nothing_for_native_inhibition() {
        let mut controller = start(AppConfig::default(), &[]).controller;
        controller.call_connected();

        assert!(!minimize_then_restore(&mut controller)
            .contains(&Effect::SendToPage(PageSignal::EnableWakeLock)));
        assert!(controller
            .handle_event(SurfaceEvent::RestoredFromMinimized)
            .is_empty());
    }

    #[test]
    fn second_instance_after_close_is_ignored() {
        let mut controller = start(AppConfig::default(), &[]).controller;
        controller.handle_event(SurfaceEvent::Closed);

        assert!(controller
            .on_second_instance(
                &["https://teams.microsoft.com/l/meetup-join/abc"],
                Instant::now()
            )
            .is_empty());
    }
}
