/// Event dispatcher and session state
///
/// The session owns the host handle, the grouping engine and all derived
/// in-memory state (tab mirror, history, recents, settings snapshot). Host
/// lifecycle events and keyboard commands enter here, one handler
/// invocation per event; handlers run on a single-threaded executor and
/// may interleave at await points, so state borrows are confined to
/// synchronous sections and every handler re-reads persisted settings
/// instead of trusting its snapshot.
use crate::browser::Browser;
use crate::grouping::GroupingEngine;
use crate::history::{HistorySnapshot, HistoryStyle, TabHistory};
use crate::recent::RecentTabs;
use crate::settings::Settings;
use crate::tab_data::{TabId, TabInfo, WindowId};
use std::cell::RefCell;
use std::collections::HashMap;

/// Storage key for the activation history (entries + cursor).
pub const HISTORY_KEY: &str = "tabHistory";
/// Storage key for the recent-tabs list.
pub const RECENTS_KEY: &str = "recentTabs";

/// How long recording stays suppressed after a programmatic jump. The jump
/// itself fires a tab-activation event; without this window it would be
/// re-recorded as a fresh history entry.
const NAVIGATION_SETTLE_MS: u32 = 250;

/// Keyboard-shortcut commands delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NavigateBackward,
    NavigateForward,
    OpenSearch,
}

impl Command {
    pub fn from_id(id: &str) -> Option<Command> {
        match id {
            "navigate-backward" => Some(Command::NavigateBackward),
            "navigate-forward" => Some(Command::NavigateForward),
            "open-search" => Some(Command::OpenSearch),
            _ => None,
        }
    }
}

struct SessionState {
    settings: Settings,
    tabs: HashMap<TabId, TabInfo>,
    history: TabHistory,
    recents: RecentTabs,
}

pub struct Session<B: Browser> {
    browser: B,
    grouping: GroupingEngine,
    state: RefCell<SessionState>,
}

impl<B: Browser> Session<B> {
    /// Bring the engine up: load settings (persisting defaults on first
    /// run), prime the tab mirror from a full query, restore persisted
    /// history/recents minus tabs that closed while we were asleep, and
    /// write the cleaned state back for the popup.
    pub async fn initialize(browser: B, style: HistoryStyle) -> Session<B> {
        let settings = Settings::load(&browser).await;

        let tabs: HashMap<TabId, TabInfo> = match browser.all_tabs().await {
            Ok(tabs) => tabs.into_iter().map(|t| (t.id, t)).collect(),
            Err(err) => {
                log::error!("error querying tabs at startup: {err}");
                HashMap::new()
            }
        };

        let snapshot = match browser.storage_get(HISTORY_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => HistorySnapshot::default(),
            Err(err) => {
                log::error!("error loading tab history: {err}");
                HistorySnapshot::default()
            }
        };
        let history = TabHistory::restore(style, snapshot, |id| tabs.contains_key(&id));

        let recent_ids: Vec<TabId> = match browser.storage_get(RECENTS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Vec::new(),
        };
        let recents = RecentTabs::restore(
            recent_ids
                .into_iter()
                .filter(|id| tabs.contains_key(id))
                .collect(),
            settings.recent_tabs_count,
        );

        let tab_count = tabs.len();
        let session = Session {
            browser,
            grouping: GroupingEngine::new(),
            state: RefCell::new(SessionState {
                settings,
                tabs,
                history,
                recents,
            }),
        };
        session.persist_history().await;
        session.persist_recents().await;
        log::info!("tab engine initialized with {tab_count} open tabs");
        session
    }

    /// The user switched tabs (or one of our jumps did). Records history
    /// and recents, then re-evaluates grouping for the tab and its window.
    pub async fn handle_tab_activated(&self, tab_id: TabId, _window_id: WindowId) {
        {
            let mut state = self.state.borrow_mut();
            let limit = state.settings.recent_tabs_count;
            state.history.record_activation(tab_id);
            state.recents.note_activation(tab_id, limit);
        }
        self.persist_history().await;
        self.persist_recents().await;

        // Re-read the tab: the cached mirror may hold a stale group id.
        let tab = match self.browser.tab(tab_id).await {
            Ok(tab) => tab,
            Err(err) => {
                log::debug!("activated tab {tab_id} vanished: {err}");
                return;
            }
        };
        self.state.borrow_mut().tabs.insert(tab.id, tab.clone());

        let settings = self.reload_settings().await;
        self.grouping
            .apply_to_tab(&self.browser, &settings, &tab)
            .await;
        self.grouping
            .enforce_window(&self.browser, &settings, tab.window_id)
            .await;
    }

    pub async fn handle_tab_created(&self, tab: TabInfo) {
        self.state.borrow_mut().tabs.insert(tab.id, tab.clone());

        if !GroupingEngine::is_eligible(&tab) {
            return;
        }
        let settings = self.reload_settings().await;
        self.grouping
            .apply_to_tab(&self.browser, &settings, &tab)
            .await;
    }

    /// Tab metadata changed. Grouping only re-evaluates on URL changes.
    pub async fn handle_tab_updated(&self, tab: TabInfo, url_changed: bool) {
        self.state.borrow_mut().tabs.insert(tab.id, tab.clone());

        if !url_changed {
            return;
        }
        let settings = self.reload_settings().await;
        self.grouping
            .apply_to_tab(&self.browser, &settings, &tab)
            .await;
        self.grouping
            .enforce_window(&self.browser, &settings, tab.window_id)
            .await;
    }

    pub async fn handle_tab_removed(&self, tab_id: TabId) {
        let window = {
            let mut state = self.state.borrow_mut();
            let window = state.tabs.remove(&tab_id).map(|t| t.window_id);
            state.history.remove(tab_id);
            state.recents.remove(tab_id);
            window
        };
        self.persist_history().await;
        self.persist_recents().await;

        if let Some(window) = window {
            let settings = self.reload_settings().await;
            self.grouping
                .enforce_window(&self.browser, &settings, window)
                .await;
        }
    }

    pub async fn handle_command(&self, command: Command) {
        match command {
            Command::NavigateBackward => self.navigate_backward().await,
            Command::NavigateForward => self.navigate_forward().await,
            // Search lives in the popup; the glue layer opens it.
            Command::OpenSearch => {}
        }
    }

    /// Extension installed or updated. Settings are lazily defaulted here
    /// so the popup finds a complete object on its first read.
    pub async fn handle_installed(&self) {
        let settings = Settings::load(&self.browser).await;
        self.state.borrow_mut().settings = settings;
        log::info!("install hook complete");
    }

    pub async fn navigate_backward(&self) {
        let target = self.state.borrow().history.back_target();
        if let Some(position) = target {
            self.navigate_to_position(position).await;
        }
    }

    pub async fn navigate_forward(&self) {
        let target = self.state.borrow().history.forward_target();
        if let Some(position) = target {
            self.navigate_to_position(position).await;
        }
    }

    /// Jump to a history position: activate that tab and focus its window.
    ///
    /// Entries can go stale: a tab may close between the history write and
    /// the jump. A stale entry is dropped and the same position retried
    /// against the shifted sequence, so the jump lands on the next tab that
    /// still exists.
    pub async fn navigate_to_position(&self, position: usize) {
        loop {
            let target = {
                let mut state = self.state.borrow_mut();
                let target = state.history.entry_at(position);
                if target.is_some() {
                    state.history.begin_jump(position);
                }
                target
            };
            let Some(tab_id) = target else {
                self.state.borrow_mut().history.end_jump();
                return;
            };

            match self.activate(tab_id).await {
                Ok(()) => {
                    self.persist_history().await;
                    // Hold suppression until the activation event the jump
                    // itself fired has come and gone.
                    self.browser.sleep(NAVIGATION_SETTLE_MS).await;
                    self.state.borrow_mut().history.end_jump();
                    return;
                }
                Err(err) => {
                    log::debug!("history entry {tab_id} is stale, skipping: {err}");
                    {
                        let mut state = self.state.borrow_mut();
                        state.history.remove(tab_id);
                        state.history.end_jump();
                        state.tabs.remove(&tab_id);
                        state.recents.remove(tab_id);
                    }
                    self.persist_history().await;
                    self.persist_recents().await;
                }
            }
        }
    }

    async fn activate(&self, tab_id: TabId) -> Result<(), crate::error::HostError> {
        let tab = self.browser.tab(tab_id).await?;
        self.browser.activate_tab(tab_id).await?;
        self.browser.focus_window(tab.window_id).await?;
        Ok(())
    }

    // ---- view-layer surface ------------------------------------------

    pub fn settings(&self) -> Settings {
        self.state.borrow().settings.clone()
    }

    pub async fn update_settings(&self, settings: Settings) {
        settings.save(&self.browser).await;
        self.state.borrow_mut().settings = settings;
    }

    /// Snapshot of the cached tab mirror, ordered by tab id.
    pub fn tabs(&self) -> Vec<TabInfo> {
        let mut tabs: Vec<TabInfo> = self.state.borrow().tabs.values().cloned().collect();
        tabs.sort_by_key(|t| t.id);
        tabs
    }

    pub fn history(&self) -> HistorySnapshot {
        self.state.borrow().history.snapshot()
    }

    pub fn recent_tabs(&self) -> Vec<TabId> {
        self.state.borrow().recents.entries().to_vec()
    }

    // ---- persistence -------------------------------------------------

    /// Settings may have been edited in the popup since the last event;
    /// re-read them rather than trusting the snapshot.
    async fn reload_settings(&self) -> Settings {
        let settings = Settings::load(&self.browser).await;
        self.state.borrow_mut().settings = settings.clone();
        settings
    }

    async fn persist_history(&self) {
        let snapshot = self.state.borrow().history.snapshot();
        match serde_json::to_value(&snapshot) {
            Ok(value) => {
                if let Err(err) = self.browser.storage_set(HISTORY_KEY, value).await {
                    log::error!("error saving tab history: {err}");
                }
            }
            Err(err) => log::error!("error serializing tab history: {err}"),
        }
    }

    async fn persist_recents(&self) {
        let entries = self.state.borrow().recents.entries().to_vec();
        match serde_json::to_value(&entries) {
            Ok(value) => {
                if let Err(err) = self.browser.storage_set(RECENTS_KEY, value).await {
                    log::error!("error saving recent tabs: {err}");
                }
            }
            Err(err) => log::error!("error serializing recent tabs: {err}"),
        }
    }
}
