/// chrome.* bindings and event wiring (wasm only)
///
/// Binds the [`Browser`] trait to the extension APIs and subscribes the
/// session's handlers to tab lifecycle events. Each host event spawns one
/// local task; the service worker's microtask queue serializes them up to
/// their await points.
use crate::browser::Browser;
use crate::error::HostError;
use crate::history::HistoryStyle;
use crate::session::{Command, Session};
use crate::tab_data::{GroupColor, GroupId, GroupInfo, TabId, TabInfo, WindowId};
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = query, catch)]
    async fn tabs_query(query: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = get, catch)]
    async fn tabs_get(tab_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = update, catch)]
    async fn tabs_update(tab_id: i32, props: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = group, catch)]
    async fn tabs_group(options: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = ungroup, catch)]
    async fn tabs_ungroup(tab_ids: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabGroups"], js_name = get, catch)]
    async fn tab_groups_get(group_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabGroups"], js_name = query, catch)]
    async fn tab_groups_query(query: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabGroups"], js_name = update, catch)]
    async fn tab_groups_update(group_id: i32, props: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "windows"], js_name = update, catch)]
    async fn windows_update(window_id: i32, props: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = get, catch)]
    async fn storage_local_get(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set, catch)]
    async fn storage_local_set(items: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = openPopup, catch)]
    async fn action_open_popup() -> Result<(), JsValue>;
}

/// Translate a rejected chrome.* promise into the engine's error taxonomy.
/// The transient grouping conflict is recognized by its message signature.
fn host_err(err: JsValue) -> HostError {
    let message = err
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(&err, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{err:?}"));

    if message.contains("cannot be edited") {
        HostError::EditInProgress(message)
    } else {
        HostError::Other(message)
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, HostError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| HostError::Other(err.to_string()))
}

/// Deserialize an array of host tab records, skipping entries the engine
/// cannot represent (e.g. devtools tabs without an id).
fn tabs_from_js(value: JsValue) -> Result<Vec<TabInfo>, HostError> {
    let raw: Vec<serde_json::Value> = serde_wasm_bindgen::from_value(value)
        .map_err(|err| HostError::Other(err.to_string()))?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

fn groups_from_js(value: JsValue) -> Result<Vec<GroupInfo>, HostError> {
    serde_wasm_bindgen::from_value(value).map_err(|err| HostError::Other(err.to_string()))
}

/// The real browser, as a [`Browser`] implementation.
pub struct ChromeBrowser;

impl Browser for ChromeBrowser {
    async fn all_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        let query = to_js(&serde_json::json!({}))?;
        tabs_from_js(tabs_query(&query).await.map_err(host_err)?)
    }

    async fn tabs_in_window(&self, window: WindowId) -> Result<Vec<TabInfo>, HostError> {
        let query = to_js(&serde_json::json!({ "windowId": window }))?;
        tabs_from_js(tabs_query(&query).await.map_err(host_err)?)
    }

    async fn tab(&self, id: TabId) -> Result<TabInfo, HostError> {
        let value = tabs_get(id).await.map_err(|err| match host_err(err) {
            HostError::Other(msg) if msg.contains("No tab with id") => HostError::NoSuchTab(id),
            other => other,
        })?;
        serde_wasm_bindgen::from_value(value).map_err(|err| HostError::Other(err.to_string()))
    }

    async fn activate_tab(&self, id: TabId) -> Result<(), HostError> {
        let props = to_js(&serde_json::json!({ "active": true }))?;
        tabs_update(id, &props).await.map_err(|err| match host_err(err) {
            HostError::Other(msg) if msg.contains("No tab with id") => HostError::NoSuchTab(id),
            other => other,
        })?;
        Ok(())
    }

    async fn focus_window(&self, id: WindowId) -> Result<(), HostError> {
        let props = to_js(&serde_json::json!({ "focused": true }))?;
        windows_update(id, &props).await.map_err(host_err)?;
        Ok(())
    }

    async fn group(&self, id: GroupId) -> Result<GroupInfo, HostError> {
        let value = tab_groups_get(id).await.map_err(|err| match host_err(err) {
            HostError::Other(msg) if msg.contains("No group with id") => HostError::NoSuchGroup(id),
            other => other,
        })?;
        serde_wasm_bindgen::from_value(value).map_err(|err| HostError::Other(err.to_string()))
    }

    async fn groups_titled(
        &self,
        title: &str,
        window: WindowId,
    ) -> Result<Vec<GroupInfo>, HostError> {
        let query = to_js(&serde_json::json!({ "title": title, "windowId": window }))?;
        groups_from_js(tab_groups_query(&query).await.map_err(host_err)?)
    }

    async fn groups_in_window(&self, window: WindowId) -> Result<Vec<GroupInfo>, HostError> {
        let query = to_js(&serde_json::json!({ "windowId": window }))?;
        groups_from_js(tab_groups_query(&query).await.map_err(host_err)?)
    }

    async fn group_tabs(
        &self,
        tabs: &[TabId],
        group: Option<GroupId>,
    ) -> Result<GroupId, HostError> {
        let options = match group {
            Some(group_id) => to_js(&serde_json::json!({ "tabIds": tabs, "groupId": group_id }))?,
            None => to_js(&serde_json::json!({ "tabIds": tabs }))?,
        };
        let value = tabs_group(&options).await.map_err(host_err)?;
        value
            .as_f64()
            .map(|id| id as GroupId)
            .ok_or_else(|| HostError::Other("tabs.group returned no group id".into()))
    }

    async fn ungroup_tabs(&self, tabs: &[TabId]) -> Result<(), HostError> {
        let ids = to_js(&tabs)?;
        tabs_ungroup(&ids).await.map_err(host_err)?;
        Ok(())
    }

    async fn update_group(
        &self,
        id: GroupId,
        title: &str,
        color: GroupColor,
    ) -> Result<(), HostError> {
        let props = to_js(&serde_json::json!({ "title": title, "color": color.as_str() }))?;
        tab_groups_update(id, &props).await.map_err(host_err)?;
        Ok(())
    }

    async fn storage_get(&self, key: &str) -> Result<Option<serde_json::Value>, HostError> {
        let items = storage_local_get(key)
            .await
            .map_err(|err| HostError::Storage(host_err(err).to_string()))?;
        let value = js_sys::Reflect::get(&items, &JsValue::from_str(key))
            .map_err(|err| HostError::Storage(host_err(err).to_string()))?;
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        serde_wasm_bindgen::from_value(value)
            .map(Some)
            .map_err(|err| HostError::Storage(err.to_string()))
    }

    async fn storage_set(&self, key: &str, value: serde_json::Value) -> Result<(), HostError> {
        let mut entry = serde_json::Map::new();
        entry.insert(key.to_string(), value);
        let items = to_js(&serde_json::Value::Object(entry))
            .map_err(|err| HostError::Storage(err.to_string()))?;
        storage_local_set(&items)
            .await
            .map_err(|err| HostError::Storage(host_err(err).to_string()))?;
        Ok(())
    }

    async fn sleep(&self, ms: u32) {
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let global = js_sys::global();
            let set_timeout = js_sys::Reflect::get(&global, &JsValue::from_str("setTimeout"));
            if let Ok(set_timeout) = set_timeout {
                if let Some(set_timeout) = set_timeout.dyn_ref::<js_sys::Function>() {
                    let _ = set_timeout.call2(&global, &resolve, &JsValue::from_f64(ms as f64));
                }
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

/// Entry point for the background service worker: bring up the session and
/// subscribe to host events.
pub fn start_background() {
    spawn_local(async {
        let session = Rc::new(Session::initialize(ChromeBrowser, HistoryStyle::PositionAware).await);
        wire_listeners(&session);
    });
}

/// Walk a dotted global path (e.g. chrome.tabs.onActivated) and call its
/// addListener. Missing surfaces are logged and skipped; a browser without
/// tab groups should not take the whole engine down.
fn subscribe(path: &[&str], callback: &js_sys::Function) {
    let mut target: JsValue = js_sys::global().into();
    for segment in path {
        match js_sys::Reflect::get(&target, &JsValue::from_str(segment)) {
            Ok(next) if !next.is_undefined() => target = next,
            _ => {
                log::warn!("host surface {} is unavailable", path.join("."));
                return;
            }
        }
    }
    let add = js_sys::Reflect::get(&target, &JsValue::from_str("addListener"))
        .ok()
        .and_then(|f| f.dyn_into::<js_sys::Function>().ok());
    match add {
        Some(add) => {
            if let Err(err) = add.call1(&target, callback) {
                log::error!("addListener on {} failed: {err:?}", path.join("."));
            }
        }
        None => log::warn!("{} has no addListener", path.join(".")),
    }
}

fn prop_i32(obj: &JsValue, name: &str) -> Option<i32> {
    js_sys::Reflect::get(obj, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.as_f64())
        .map(|v| v as i32)
}

fn wire_listeners(session: &Rc<Session<ChromeBrowser>>) {
    // Tab activation (when user switches tabs)
    {
        let session = session.clone();
        let callback = Closure::wrap(Box::new(move |info: JsValue| {
            let session = session.clone();
            let tab_id = prop_i32(&info, "tabId");
            let window_id = prop_i32(&info, "windowId");
            spawn_local(async move {
                if let (Some(tab_id), Some(window_id)) = (tab_id, window_id) {
                    session.handle_tab_activated(tab_id, window_id).await;
                }
            });
        }) as Box<dyn FnMut(JsValue)>);
        subscribe(&["chrome", "tabs", "onActivated"], callback.as_ref().unchecked_ref());
        callback.forget();
    }

    // Tab creation
    {
        let session = session.clone();
        let callback = Closure::wrap(Box::new(move |tab: JsValue| {
            let session = session.clone();
            let tab: Option<TabInfo> = serde_wasm_bindgen::from_value(tab).ok();
            spawn_local(async move {
                if let Some(tab) = tab {
                    session.handle_tab_created(tab).await;
                }
            });
        }) as Box<dyn FnMut(JsValue)>);
        subscribe(&["chrome", "tabs", "onCreated"], callback.as_ref().unchecked_ref());
        callback.forget();
    }

    // Tab update (URL changes, etc.)
    {
        let session = session.clone();
        let callback = Closure::wrap(Box::new(move |_tab_id: JsValue, change: JsValue, tab: JsValue| {
            let session = session.clone();
            let url_changed = js_sys::Reflect::get(&change, &JsValue::from_str("url"))
                .map(|v| !v.is_undefined())
                .unwrap_or(false);
            let tab: Option<TabInfo> = serde_wasm_bindgen::from_value(tab).ok();
            spawn_local(async move {
                if let Some(tab) = tab {
                    session.handle_tab_updated(tab, url_changed).await;
                }
            });
        }) as Box<dyn FnMut(JsValue, JsValue, JsValue)>);
        subscribe(&["chrome", "tabs", "onUpdated"], callback.as_ref().unchecked_ref());
        callback.forget();
    }

    // Tab removal
    {
        let session = session.clone();
        let callback = Closure::wrap(Box::new(move |tab_id: JsValue, _info: JsValue| {
            let session = session.clone();
            let tab_id = tab_id.as_f64().map(|v| v as i32);
            spawn_local(async move {
                if let Some(tab_id) = tab_id {
                    session.handle_tab_removed(tab_id).await;
                }
            });
        }) as Box<dyn FnMut(JsValue, JsValue)>);
        subscribe(&["chrome", "tabs", "onRemoved"], callback.as_ref().unchecked_ref());
        callback.forget();
    }

    // Commands (keyboard shortcuts)
    {
        let session = session.clone();
        let callback = Closure::wrap(Box::new(move |command: JsValue| {
            let session = session.clone();
            let command = command.as_string().and_then(|id| Command::from_id(&id));
            spawn_local(async move {
                match command {
                    Some(Command::OpenSearch) => {
                        if let Err(err) = action_open_popup().await {
                            log::debug!("could not open popup: {err:?}");
                        }
                    }
                    Some(command) => session.handle_command(command).await,
                    None => {}
                }
            });
        }) as Box<dyn FnMut(JsValue)>);
        subscribe(&["chrome", "commands", "onCommand"], callback.as_ref().unchecked_ref());
        callback.forget();
    }

    // Installed/updated lifecycle signal
    {
        let session = session.clone();
        let callback = Closure::wrap(Box::new(move |_details: JsValue| {
            let session = session.clone();
            spawn_local(async move {
                session.handle_installed().await;
            });
        }) as Box<dyn FnMut(JsValue)>);
        subscribe(&["chrome", "runtime", "onInstalled"], callback.as_ref().unchecked_ref());
        callback.forget();
    }
}
