/// The host capability surface
///
/// Everything the engine needs from the browser goes through this trait:
/// tab and group queries/mutations, window focus, the key-value store, and
/// timed waits. The wasm build binds it to the chrome.* APIs; tests run the
/// engine against an in-memory fake.
use crate::error::HostError;
use crate::tab_data::{GroupColor, GroupId, GroupInfo, TabId, TabInfo, WindowId};

/// Browser host API, as seen by the engine.
///
/// All futures run on a single-threaded executor (the extension service
/// worker's microtask queue), so none of them are required to be `Send`.
#[allow(async_fn_in_trait)]
pub trait Browser {
    /// All tabs across all windows.
    async fn all_tabs(&self) -> Result<Vec<TabInfo>, HostError>;

    /// Tabs in one window.
    async fn tabs_in_window(&self, window: WindowId) -> Result<Vec<TabInfo>, HostError>;

    /// Look up a single tab. Fails with [`HostError::NoSuchTab`] once the
    /// tab has been closed.
    async fn tab(&self, id: TabId) -> Result<TabInfo, HostError>;

    /// Make a tab the active tab of its window.
    async fn activate_tab(&self, id: TabId) -> Result<(), HostError>;

    /// Bring a window to the front.
    async fn focus_window(&self, id: WindowId) -> Result<(), HostError>;

    /// Look up a group by id.
    async fn group(&self, id: GroupId) -> Result<GroupInfo, HostError>;

    /// Groups in a window whose title matches exactly.
    async fn groups_titled(
        &self,
        title: &str,
        window: WindowId,
    ) -> Result<Vec<GroupInfo>, HostError>;

    /// All groups in a window.
    async fn groups_in_window(&self, window: WindowId) -> Result<Vec<GroupInfo>, HostError>;

    /// Add tabs to an existing group, or create a fresh group for them when
    /// `group` is `None`. Returns the group id. May fail with the transient
    /// [`HostError::EditInProgress`] conflict; callers retry through the
    /// retry executor.
    async fn group_tabs(
        &self,
        tabs: &[TabId],
        group: Option<GroupId>,
    ) -> Result<GroupId, HostError>;

    /// Remove tabs from whatever groups they are in.
    async fn ungroup_tabs(&self, tabs: &[TabId]) -> Result<(), HostError>;

    /// Set a group's title and color.
    async fn update_group(
        &self,
        id: GroupId,
        title: &str,
        color: GroupColor,
    ) -> Result<(), HostError>;

    /// Read one key from the host's key-value store.
    async fn storage_get(&self, key: &str) -> Result<Option<serde_json::Value>, HostError>;

    /// Write one key to the host's key-value store. No transactional
    /// guarantees across keys.
    async fn storage_set(&self, key: &str, value: serde_json::Value) -> Result<(), HostError>;

    /// Suspend for (at least) `ms` milliseconds. Timed waits are a host
    /// capability so the engine stays deterministic under test.
    async fn sleep(&self, ms: u32);
}
