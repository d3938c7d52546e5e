/// Persisted settings and user-defined group rules
use crate::browser::Browser;
use crate::tab_data::GroupColor;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Storage key the settings object lives under.
pub const SETTINGS_KEY: &str = "settings";

/// Theme preference. Applied by the popup; the engine only persists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// A user-authored keyword-to-group mapping. Takes precedence over domain
/// classification; the engine never renames or dissolves these groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserGroupRule {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "keywords_list_or_csv")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub color: GroupColor,
}

impl UserGroupRule {
    pub fn new(name: &str, keywords: Vec<String>, color: GroupColor) -> UserGroupRule {
        UserGroupRule {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            keywords,
            color,
        }
    }

    /// Case-insensitive substring match of any keyword against the URL.
    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| !keyword.is_empty())
            .any(|keyword| url.contains(&keyword.to_lowercase()))
    }
}

/// Older builds stored keywords as one comma-separated string; accept both.
fn keywords_list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(keywords) => keywords,
        Raw::Csv(csv) => csv
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    })
}

/// Process-wide settings, persisted under [`SETTINGS_KEY`] and lazily
/// defaulted on first read. Field names match the storage shape the popup
/// reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_group_enabled: bool,
    pub recent_tabs_count: usize,
    pub min_group_size: usize,
    pub theme: Theme,
    pub user_groups: Vec<UserGroupRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_group_enabled: true,
            recent_tabs_count: 2,
            min_group_size: 2,
            theme: Theme::System,
            user_groups: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, persisting defaults on first run. Any storage or
    /// decode failure falls back to defaults; settings trouble must never
    /// take the event handlers down.
    pub async fn load<B: Browser>(browser: &B) -> Settings {
        match browser.storage_get(SETTINGS_KEY).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(settings) => settings,
                Err(err) => {
                    log::warn!("stored settings are unreadable, using defaults: {err}");
                    Settings::default()
                }
            },
            Ok(None) => {
                let settings = Settings::default();
                settings.save(browser).await;
                settings
            }
            Err(err) => {
                log::error!("error loading settings: {err}");
                Settings::default()
            }
        }
    }

    /// Persist. Failures are logged; the in-memory copy stays live.
    pub async fn save<B: Browser>(&self, browser: &B) {
        let value = match serde_json::to_value(self) {
            Ok(value) => value,
            Err(err) => {
                log::error!("error serializing settings: {err}");
                return;
            }
        };
        if let Err(err) = browser.storage_set(SETTINGS_KEY, value).await {
            log::error!("error saving settings: {err}");
        }
    }

    /// First user rule whose keywords match the URL, in declared order.
    pub fn matching_rule(&self, url: &str) -> Option<&UserGroupRule> {
        self.user_groups.iter().find(|rule| rule.matches(url))
    }

    /// Whether a group title belongs to a user-defined rule (such groups
    /// are sticky and the auto-logic leaves them alone).
    pub fn is_user_group_name(&self, title: &str) -> bool {
        self.user_groups.iter().any(|rule| rule.name == title)
    }
}
