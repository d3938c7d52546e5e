/// In-memory browser host for engine tests
///
/// Behaves like the chrome.* surface the engine cares about: tabs and groups
/// are records, grouping a tab into `None` mints a fresh group, groups with
/// no members left disappear, and the key-value store is a map. Failures can
/// be scripted to exercise the retry and degradation paths.
use crate::browser::Browser;
use crate::error::HostError;
use crate::tab_data::{GROUP_ID_NONE, GroupColor, GroupId, GroupInfo, TabId, TabInfo, WindowId};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

#[derive(Default)]
struct FakeState {
    tabs: BTreeMap<TabId, TabInfo>,
    groups: BTreeMap<GroupId, GroupInfo>,
    next_group_id: GroupId,
    storage: HashMap<String, serde_json::Value>,
    storage_broken: bool,
    /// Errors to inject into upcoming group mutations, front first.
    scripted_failures: VecDeque<HostError>,
    mutations: u32,
    sleeps: Vec<u32>,
    activated: Vec<TabId>,
    focused: Vec<WindowId>,
}

pub struct FakeBrowser {
    state: RefCell<FakeState>,
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBrowser {
    pub fn new() -> FakeBrowser {
        FakeBrowser {
            state: RefCell::new(FakeState {
                next_group_id: 100,
                ..FakeState::default()
            }),
        }
    }

    pub fn add_tab(&self, id: TabId, url: &str, window: WindowId) {
        let tab = TabInfo::new(id, url, window);
        self.state.borrow_mut().tabs.insert(id, tab);
    }

    /// Change a tab's URL in place, as a page navigation would.
    pub fn navigate_tab(&self, id: TabId, url: &str) {
        if let Some(tab) = self.state.borrow_mut().tabs.get_mut(&id) {
            tab.url = url.to_string();
        }
    }

    /// Close a tab behind the engine's back (no removal event).
    pub fn drop_tab(&self, id: TabId) {
        let mut state = self.state.borrow_mut();
        state.tabs.remove(&id);
        gc_groups(&mut state);
    }

    pub fn tab_group(&self, id: TabId) -> Option<GroupId> {
        self.state
            .borrow()
            .tabs
            .get(&id)
            .map(|t| t.group_id)
            .filter(|g| *g != GROUP_ID_NONE)
    }

    pub fn group_titled(&self, title: &str, window: WindowId) -> Option<GroupInfo> {
        self.state
            .borrow()
            .groups
            .values()
            .find(|g| g.title == title && g.window_id == window)
            .cloned()
    }

    pub fn group_count(&self) -> usize {
        self.state.borrow().groups.len()
    }

    /// Inject an error into the next group mutation call.
    pub fn queue_mutation_failure(&self, err: HostError) {
        self.state.borrow_mut().scripted_failures.push_back(err);
    }

    pub fn break_storage(&self, broken: bool) {
        self.state.borrow_mut().storage_broken = broken;
    }

    /// Group mutations performed so far (group, ungroup, update).
    pub fn mutation_count(&self) -> u32 {
        self.state.borrow().mutations
    }

    pub fn sleeps(&self) -> Vec<u32> {
        self.state.borrow().sleeps.clone()
    }

    pub fn activated(&self) -> Vec<TabId> {
        self.state.borrow().activated.clone()
    }

    pub fn focused(&self) -> Vec<WindowId> {
        self.state.borrow().focused.clone()
    }

    fn take_scripted_failure(state: &mut FakeState) -> Option<HostError> {
        state.scripted_failures.pop_front()
    }
}

/// The host deletes a group as soon as its last member leaves.
fn gc_groups(state: &mut FakeState) {
    let live: Vec<GroupId> = state
        .tabs
        .values()
        .map(|t| t.group_id)
        .filter(|g| *g != GROUP_ID_NONE)
        .collect();
    state.groups.retain(|id, _| live.contains(id));
}

impl Browser for FakeBrowser {
    async fn all_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        Ok(self.state.borrow().tabs.values().cloned().collect())
    }

    async fn tabs_in_window(&self, window: WindowId) -> Result<Vec<TabInfo>, HostError> {
        Ok(self
            .state
            .borrow()
            .tabs
            .values()
            .filter(|t| t.window_id == window)
            .cloned()
            .collect())
    }

    async fn tab(&self, id: TabId) -> Result<TabInfo, HostError> {
        self.state
            .borrow()
            .tabs
            .get(&id)
            .cloned()
            .ok_or(HostError::NoSuchTab(id))
    }

    async fn activate_tab(&self, id: TabId) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if !state.tabs.contains_key(&id) {
            return Err(HostError::NoSuchTab(id));
        }
        state.activated.push(id);
        Ok(())
    }

    async fn focus_window(&self, id: WindowId) -> Result<(), HostError> {
        self.state.borrow_mut().focused.push(id);
        Ok(())
    }

    async fn group(&self, id: GroupId) -> Result<GroupInfo, HostError> {
        self.state
            .borrow()
            .groups
            .get(&id)
            .cloned()
            .ok_or(HostError::NoSuchGroup(id))
    }

    async fn groups_titled(
        &self,
        title: &str,
        window: WindowId,
    ) -> Result<Vec<GroupInfo>, HostError> {
        Ok(self
            .state
            .borrow()
            .groups
            .values()
            .filter(|g| g.title == title && g.window_id == window)
            .cloned()
            .collect())
    }

    async fn groups_in_window(&self, window: WindowId) -> Result<Vec<GroupInfo>, HostError> {
        Ok(self
            .state
            .borrow()
            .groups
            .values()
            .filter(|g| g.window_id == window)
            .cloned()
            .collect())
    }

    async fn group_tabs(
        &self,
        tabs: &[TabId],
        group: Option<GroupId>,
    ) -> Result<GroupId, HostError> {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(err) = Self::take_scripted_failure(&mut state) {
            return Err(err);
        }

        if tabs.is_empty() {
            return Err(HostError::Other("no tabs given".into()));
        }
        for id in tabs {
            if !state.tabs.contains_key(id) {
                return Err(HostError::NoSuchTab(*id));
            }
        }

        let group_id = match group {
            Some(id) => {
                if !state.groups.contains_key(&id) {
                    return Err(HostError::NoSuchGroup(id));
                }
                id
            }
            None => {
                let id = state.next_group_id;
                state.next_group_id += 1;
                let window = state.tabs[&tabs[0]].window_id;
                state.groups.insert(
                    id,
                    GroupInfo {
                        id,
                        title: String::new(),
                        color: GroupColor::Grey,
                        window_id: window,
                    },
                );
                id
            }
        };

        for id in tabs {
            if let Some(tab) = state.tabs.get_mut(id) {
                tab.group_id = group_id;
            }
        }
        gc_groups(&mut state);
        Ok(group_id)
    }

    async fn ungroup_tabs(&self, tabs: &[TabId]) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(err) = Self::take_scripted_failure(&mut state) {
            return Err(err);
        }

        for id in tabs {
            if let Some(tab) = state.tabs.get_mut(id) {
                tab.group_id = GROUP_ID_NONE;
            }
        }
        gc_groups(&mut state);
        Ok(())
    }

    async fn update_group(
        &self,
        id: GroupId,
        title: &str,
        color: GroupColor,
    ) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(err) = Self::take_scripted_failure(&mut state) {
            return Err(err);
        }

        let group = state
            .groups
            .get_mut(&id)
            .ok_or(HostError::NoSuchGroup(id))?;
        group.title = title.to_string();
        group.color = color;
        Ok(())
    }

    async fn storage_get(&self, key: &str) -> Result<Option<serde_json::Value>, HostError> {
        let state = self.state.borrow();
        if state.storage_broken {
            return Err(HostError::Storage("storage unavailable".into()));
        }
        Ok(state.storage.get(key).cloned())
    }

    async fn storage_set(&self, key: &str, value: serde_json::Value) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.storage_broken {
            return Err(HostError::Storage("storage unavailable".into()));
        }
        state.storage.insert(key.to_string(), value);
        Ok(())
    }

    async fn sleep(&self, ms: u32) {
        self.state.borrow_mut().sleeps.push(ms);
    }
}
