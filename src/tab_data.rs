/// Data structures for Tab Corral
use serde::{Deserialize, Serialize};

/// Host-assigned tab identifier, stable while the tab is open.
pub type TabId = i32;
/// Host-assigned window identifier.
pub type WindowId = i32;
/// Host-assigned tab-group identifier.
pub type GroupId = i32;

/// Sentinel the host uses for a tab that is not in any group
/// (chrome.tabGroups.TAB_GROUP_ID_NONE).
pub const GROUP_ID_NONE: GroupId = -1;

/// Cached mirror of a browser tab. The host owns the real record; this copy
/// is refreshed on every lifecycle event and dropped on removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub window_id: WindowId,
    #[serde(default = "ungrouped")]
    pub group_id: GroupId,
}

fn ungrouped() -> GroupId {
    GROUP_ID_NONE
}

impl TabInfo {
    pub fn new(id: TabId, url: &str, window_id: WindowId) -> TabInfo {
        TabInfo {
            id,
            url: url.to_string(),
            title: String::new(),
            window_id,
            group_id: GROUP_ID_NONE,
        }
    }

    /// Whether the host currently has this tab in a group.
    pub fn is_grouped(&self) -> bool {
        self.group_id != GROUP_ID_NONE
    }
}

/// A host tab group. Groups never span windows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: GroupId,
    #[serde(default)]
    pub title: String,
    pub color: GroupColor,
    pub window_id: WindowId,
}

/// The host's fixed tab-group color palette, in the host's declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
}

impl GroupColor {
    /// Palette order matters: the color assigner indexes into this array.
    pub const PALETTE: [GroupColor; 8] = [
        GroupColor::Grey,
        GroupColor::Blue,
        GroupColor::Red,
        GroupColor::Yellow,
        GroupColor::Green,
        GroupColor::Pink,
        GroupColor::Purple,
        GroupColor::Cyan,
    ];

    /// The string the host API expects for this color.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupColor::Grey => "grey",
            GroupColor::Blue => "blue",
            GroupColor::Red => "red",
            GroupColor::Yellow => "yellow",
            GroupColor::Green => "green",
            GroupColor::Pink => "pink",
            GroupColor::Purple => "purple",
            GroupColor::Cyan => "cyan",
        }
    }
}

impl Default for GroupColor {
    fn default() -> Self {
        GroupColor::Blue
    }
}

impl std::fmt::Display for GroupColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_info_creation() {
        let tab = TabInfo::new(1, "https://google.com", 10);

        assert_eq!(tab.id, 1);
        assert_eq!(tab.url, "https://google.com");
        assert_eq!(tab.window_id, 10);
        assert!(!tab.is_grouped());
    }

    #[test]
    fn test_tab_deserializes_from_host_shape() {
        // Shape chrome.tabs.query returns (camelCase, groupId may be absent).
        let json = r#"{"id": 7, "url": "https://github.com", "title": "GitHub", "windowId": 3}"#;
        let tab: TabInfo = serde_json::from_str(json).unwrap();

        assert_eq!(tab.id, 7);
        assert_eq!(tab.window_id, 3);
        assert_eq!(tab.group_id, GROUP_ID_NONE);
    }

    #[test]
    fn test_group_color_serializes_lowercase() {
        let json = serde_json::to_string(&GroupColor::Purple).unwrap();
        assert_eq!(json, "\"purple\"");

        let color: GroupColor = serde_json::from_str("\"cyan\"").unwrap();
        assert_eq!(color, GroupColor::Cyan);
    }

    #[test]
    fn test_group_info_round_trip() {
        let group = GroupInfo {
            id: 4,
            title: "github.com".to_string(),
            color: GroupColor::Green,
            window_id: 1,
        };

        let json = serde_json::to_string(&group).unwrap();
        let back: GroupInfo = serde_json::from_str(&json).unwrap();

        assert_eq!(back, group);
    }
}
