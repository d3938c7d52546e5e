/// Auto-grouping engine
///
/// Keeps every eligible tab in the group its current rules say it should be
/// in, without fighting the user's own groups. User-defined keyword rules
/// win over domain classification; auto-groups are subject to a minimum
/// size and get dissolved when they fall below it.
use crate::browser::Browser;
use crate::color::color_for_name;
use crate::domain::auto_group_name;
use crate::error::HostError;
use crate::retry::{RetryPolicy, with_retry};
use crate::settings::Settings;
use crate::tab_data::{GroupColor, GroupId, TabId, TabInfo, WindowId};
use std::collections::{BTreeMap, HashSet};

pub struct GroupingEngine {
    retry: RetryPolicy,
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupingEngine {
    pub fn new() -> GroupingEngine {
        GroupingEngine {
            retry: RetryPolicy::default(),
        }
    }

    /// Tabs with no URL, the new-tab page, browser-internal pages and
    /// extension pages never get grouped.
    pub fn is_eligible(tab: &TabInfo) -> bool {
        !(tab.url.is_empty()
            || tab.url == "chrome://newtab/"
            || tab.url.starts_with("chrome://")
            || tab.url.starts_with("chrome-extension://"))
    }

    /// Per-tab grouping decision, in precedence order:
    ///
    /// 1. a tab sitting in a group named after a user rule stays put;
    /// 2. the first user rule whose keywords match the URL claims the tab;
    /// 3. otherwise, when auto-grouping is on, the tab's domain partition
    ///    is (re)applied in its window, subject to the minimum group size.
    ///
    /// Grouping failures are logged and swallowed: one tab's trouble must
    /// not block its siblings or crash the handler.
    pub async fn apply_to_tab<B: Browser>(&self, browser: &B, settings: &Settings, tab: &TabInfo) {
        if !Self::is_eligible(tab) {
            return;
        }

        if tab.is_grouped() {
            match browser.group(tab.group_id).await {
                Ok(group) if settings.is_user_group_name(&group.title) => return,
                Ok(_) => {}
                // Group may be gone already; continue deciding.
                Err(err) => log::debug!("error checking existing group: {err}"),
            }
        }

        if let Some(rule) = settings.matching_rule(&tab.url) {
            if let Err(err) = self
                .ensure_in_named_group(browser, tab, &rule.name, rule.color)
                .await
            {
                log::error!("failed to apply user group {:?}: {err}", rule.name);
            }
            return;
        }

        if settings.auto_group_enabled {
            let name = auto_group_name(&tab.url);
            if let Err(err) = self
                .enforce_partition(browser, settings, tab.window_id, &name)
                .await
            {
                log::error!("failed to apply auto grouping for {name:?}: {err}");
            }
        }
    }

    /// Window-level enforcement: recompute the domain partition of all
    /// eligible tabs in the window (tabs held by user-rule groups stay out
    /// of it), then apply the minimum-size policy to every class. Runs on
    /// tab removal, activation and URL changes.
    ///
    /// Idempotence is part of the contract: over a window that already
    /// conforms, this issues no host mutations.
    pub async fn enforce_window<B: Browser>(
        &self,
        browser: &B,
        settings: &Settings,
        window: WindowId,
    ) {
        if !settings.auto_group_enabled {
            return;
        }

        let partitions = match self.window_partitions(browser, settings, window).await {
            Ok(partitions) => partitions,
            Err(err) => {
                log::error!("cannot read window {window} for enforcement: {err}");
                return;
            }
        };

        for (name, members) in &partitions {
            if let Err(err) = self
                .apply_partition(browser, settings, window, name, members)
                .await
            {
                log::error!("enforcement of {name:?} in window {window} failed: {err}");
            }
        }
    }

    /// Re-derive and apply a single domain class in a window.
    async fn enforce_partition<B: Browser>(
        &self,
        browser: &B,
        settings: &Settings,
        window: WindowId,
        name: &str,
    ) -> Result<(), HostError> {
        let partitions = self.window_partitions(browser, settings, window).await?;
        let members = partitions.get(name).map(Vec::as_slice).unwrap_or(&[]);
        self.apply_partition(browser, settings, window, name, members)
            .await
    }

    /// Domain classification of the window's eligible tabs, minus anything
    /// claimed by a user-rule group.
    async fn window_partitions<B: Browser>(
        &self,
        browser: &B,
        settings: &Settings,
        window: WindowId,
    ) -> Result<BTreeMap<String, Vec<TabInfo>>, HostError> {
        let tabs = browser.tabs_in_window(window).await?;
        let groups = browser.groups_in_window(window).await?;
        let user_held: HashSet<GroupId> = groups
            .iter()
            .filter(|g| settings.is_user_group_name(&g.title))
            .map(|g| g.id)
            .collect();

        let mut partitions: BTreeMap<String, Vec<TabInfo>> = BTreeMap::new();
        for tab in tabs {
            if Self::is_eligible(&tab) && !user_held.contains(&tab.group_id) {
                partitions
                    .entry(auto_group_name(&tab.url))
                    .or_default()
                    .push(tab);
            }
        }
        Ok(partitions)
    }

    /// Apply the minimum-size policy to one domain class: at or above the
    /// threshold every member ends up in a single group carrying the
    /// derived name and color; below it, grouped members are ungrouped.
    async fn apply_partition<B: Browser>(
        &self,
        browser: &B,
        settings: &Settings,
        window: WindowId,
        name: &str,
        members: &[TabInfo],
    ) -> Result<(), HostError> {
        if members.len() >= settings.min_group_size {
            let groups = browser.groups_titled(name, window).await?;
            if let Some(group) = groups.first() {
                let joiners: Vec<TabId> = members
                    .iter()
                    .filter(|t| t.group_id != group.id)
                    .map(|t| t.id)
                    .collect();
                if !joiners.is_empty() {
                    with_retry(browser, &self.retry, || {
                        browser.group_tabs(&joiners, Some(group.id))
                    })
                    .await?;
                }
            } else {
                let ids: Vec<TabId> = members.iter().map(|t| t.id).collect();
                let group_id =
                    with_retry(browser, &self.retry, || browser.group_tabs(&ids, None)).await?;
                with_retry(browser, &self.retry, || {
                    browser.update_group(group_id, name, color_for_name(name))
                })
                .await?;
            }
        } else {
            let grouped: Vec<TabId> = members
                .iter()
                .filter(|t| t.is_grouped())
                .map(|t| t.id)
                .collect();
            if !grouped.is_empty() {
                log::debug!("dissolving undersized group {name:?} in window {window}");
                with_retry(browser, &self.retry, || browser.ungroup_tabs(&grouped)).await?;
            }
        }
        Ok(())
    }

    /// Put one tab into the named group in its window, creating the group
    /// with the given color if it does not exist yet. Used for user-rule
    /// groups, which have no minimum size.
    async fn ensure_in_named_group<B: Browser>(
        &self,
        browser: &B,
        tab: &TabInfo,
        name: &str,
        color: GroupColor,
    ) -> Result<(), HostError> {
        let groups = browser.groups_titled(name, tab.window_id).await?;
        let ids = [tab.id];

        if let Some(group) = groups.first() {
            if tab.group_id == group.id {
                return Ok(());
            }
            with_retry(browser, &self.retry, || {
                browser.group_tabs(&ids, Some(group.id))
            })
            .await?;
        } else {
            let group_id =
                with_retry(browser, &self.retry, || browser.group_tabs(&ids, None)).await?;
            with_retry(browser, &self.retry, || {
                browser.update_group(group_id, name, color)
            })
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::UserGroupRule;
    use crate::testing::FakeBrowser;
    use futures::executor::block_on;

    const WIN: WindowId = 1;

    fn engine() -> GroupingEngine {
        GroupingEngine::new()
    }

    fn settings_with_rule(name: &str, keywords: &[&str], color: GroupColor) -> Settings {
        let mut settings = Settings::default();
        settings.user_groups.push(UserGroupRule::new(
            name,
            keywords.iter().map(|k| k.to_string()).collect(),
            color,
        ));
        settings
    }

    async fn apply(browser: &FakeBrowser, settings: &Settings, tab_id: TabId) {
        let tab = browser.tab(tab_id).await.unwrap();
        engine().apply_to_tab(browser, settings, &tab).await;
    }

    #[test]
    fn test_eligibility_filter() {
        assert!(GroupingEngine::is_eligible(&TabInfo::new(1, "https://a.com", WIN)));
        assert!(!GroupingEngine::is_eligible(&TabInfo::new(2, "", WIN)));
        assert!(!GroupingEngine::is_eligible(&TabInfo::new(3, "chrome://newtab/", WIN)));
        assert!(!GroupingEngine::is_eligible(&TabInfo::new(4, "chrome://settings", WIN)));
        assert!(!GroupingEngine::is_eligible(&TabInfo::new(
            5,
            "chrome-extension://abc/popup.html",
            WIN
        )));
    }

    #[test]
    fn test_single_tab_stays_ungrouped() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);

        block_on(apply(&browser, &Settings::default(), 1));

        assert_eq!(browser.tab_group(1), None);
        assert_eq!(browser.group_count(), 0);
    }

    #[test]
    fn test_second_tab_of_a_domain_forms_a_group() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);
        browser.add_tab(2, "https://foo.com/b", WIN);

        block_on(apply(&browser, &Settings::default(), 2));

        let group = browser.group_titled("foo.com", WIN).expect("group exists");
        assert_eq!(group.color, color_for_name("foo.com"));
        assert_eq!(browser.tab_group(1), Some(group.id));
        assert_eq!(browser.tab_group(2), Some(group.id));
    }

    #[test]
    fn test_dropping_below_threshold_dissolves_the_group() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);
        browser.add_tab(2, "https://foo.com/b", WIN);
        let settings = Settings::default();

        block_on(apply(&browser, &settings, 2));
        assert!(browser.group_titled("foo.com", WIN).is_some());

        // One of them closes; the enforcement pass cleans up the leftover.
        browser.drop_tab(2);
        block_on(engine().enforce_window(&browser, &settings, WIN));

        assert_eq!(browser.tab_group(1), None);
        assert!(browser.group_titled("foo.com", WIN).is_none());
    }

    #[test]
    fn test_enforcement_pass_is_idempotent() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);
        browser.add_tab(2, "https://foo.com/b", WIN);
        browser.add_tab(3, "https://bar.com", WIN);
        let settings = Settings::default();

        block_on(engine().enforce_window(&browser, &settings, WIN));
        let after_first = browser.mutation_count();
        assert!(after_first > 0);

        block_on(engine().enforce_window(&browser, &settings, WIN));
        assert_eq!(browser.mutation_count(), after_first);
    }

    #[test]
    fn test_auto_grouping_disabled_leaves_tabs_alone() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);
        browser.add_tab(2, "https://foo.com/b", WIN);
        let mut settings = Settings::default();
        settings.auto_group_enabled = false;

        block_on(apply(&browser, &settings, 2));

        assert_eq!(browser.mutation_count(), 0);
    }

    #[test]
    fn test_user_rule_beats_domain_classification() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://github.com/acme/widget", WIN);
        let settings = settings_with_rule("Work", &["github"], GroupColor::Red);

        block_on(apply(&browser, &settings, 1));

        // The tab lands in the rule group, not in "github.com", and a
        // single tab is enough, user groups have no minimum size.
        let group = browser.group_titled("Work", WIN).expect("rule group exists");
        assert_eq!(group.color, GroupColor::Red);
        assert_eq!(browser.tab_group(1), Some(group.id));
        assert!(browser.group_titled("github.com", WIN).is_none());
    }

    #[test]
    fn test_second_match_joins_existing_rule_group() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://github.com/a", WIN);
        browser.add_tab(2, "https://github.com/b", WIN);
        let settings = settings_with_rule("Work", &["github"], GroupColor::Red);

        block_on(apply(&browser, &settings, 1));
        block_on(apply(&browser, &settings, 2));

        assert_eq!(browser.tab_group(1), browser.tab_group(2));
        let group = browser.group_titled("Work", WIN).unwrap();
        assert_eq!(group.color, GroupColor::Red);
    }

    #[test]
    fn test_user_groups_are_sticky() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://example.com", WIN);
        browser.add_tab(2, "https://example.com/2", WIN);
        // Keywords do not match example.com, but the user dragged the tab
        // into their group; the engine must leave it there.
        let settings = settings_with_rule("Reading", &["nomatch"], GroupColor::Green);

        let gid = block_on(browser.group_tabs(&[1], None)).unwrap();
        block_on(browser.update_group(gid, "Reading", GroupColor::Green)).unwrap();
        let before = browser.mutation_count();

        block_on(apply(&browser, &settings, 1));

        assert_eq!(browser.tab_group(1), Some(gid));
        assert_eq!(browser.mutation_count(), before);
    }

    #[test]
    fn test_enforcement_skips_tabs_held_by_user_groups() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);
        browser.add_tab(2, "https://foo.com/b", WIN);
        browser.add_tab(3, "https://foo.com/c", WIN);
        let settings = settings_with_rule("Pinned", &["foo.com/c"], GroupColor::Purple);

        // Tab 3 is claimed by the user rule first.
        block_on(apply(&browser, &settings, 3));
        block_on(engine().enforce_window(&browser, &settings, WIN));

        let auto = browser.group_titled("foo.com", WIN).expect("auto group");
        let pinned = browser.group_titled("Pinned", WIN).expect("user group");
        assert_eq!(browser.tab_group(1), Some(auto.id));
        assert_eq!(browser.tab_group(2), Some(auto.id));
        assert_eq!(browser.tab_group(3), Some(pinned.id));
    }

    #[test]
    fn test_groups_are_window_scoped() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", 1);
        browser.add_tab(2, "https://foo.com/b", 1);
        browser.add_tab(3, "https://foo.com/c", 2);
        browser.add_tab(4, "https://foo.com/d", 2);
        let settings = Settings::default();

        block_on(engine().enforce_window(&browser, &settings, 1));
        block_on(engine().enforce_window(&browser, &settings, 2));

        let w1 = browser.group_titled("foo.com", 1).unwrap();
        let w2 = browser.group_titled("foo.com", 2).unwrap();
        assert_ne!(w1.id, w2.id);
        assert_eq!(browser.tab_group(3), Some(w2.id));
    }

    #[test]
    fn test_transient_conflicts_are_retried() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);
        browser.add_tab(2, "https://foo.com/b", WIN);
        browser.queue_mutation_failure(HostError::EditInProgress("dragging".into()));
        browser.queue_mutation_failure(HostError::EditInProgress("dragging".into()));

        block_on(apply(&browser, &Settings::default(), 2));

        assert!(browser.group_titled("foo.com", WIN).is_some());
        assert_eq!(browser.sleeps(), vec![500, 750]);
    }

    #[test]
    fn test_one_partition_failure_does_not_block_the_rest() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://bar.com/a", WIN);
        browser.add_tab(2, "https://bar.com/b", WIN);
        browser.add_tab(3, "https://foo.com/a", WIN);
        browser.add_tab(4, "https://foo.com/b", WIN);
        // Permanent failure for the first partition mutation (bar.com;
        // partitions apply in name order).
        browser.queue_mutation_failure(HostError::Other("permission denied".into()));

        block_on(engine().enforce_window(&browser, &Settings::default(), WIN));

        assert!(browser.group_titled("bar.com", WIN).is_none());
        assert!(browser.group_titled("foo.com", WIN).is_some());
    }

    #[test]
    fn test_regrouping_an_already_grouped_tab_is_a_no_op() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://foo.com/a", WIN);
        browser.add_tab(2, "https://foo.com/b", WIN);
        let settings = Settings::default();

        block_on(apply(&browser, &settings, 1));
        let before = browser.mutation_count();

        block_on(apply(&browser, &settings, 1));
        block_on(apply(&browser, &settings, 2));

        assert_eq!(browser.mutation_count(), before);
    }
}
