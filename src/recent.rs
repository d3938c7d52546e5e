/// Recently activated tabs, for popup highlighting
use crate::tab_data::TabId;

/// Bounded most-recently-activated list. The grouping engine never reads
/// this; it exists purely so the popup can badge the last few tabs.
#[derive(Debug, Default)]
pub struct RecentTabs {
    entries: Vec<TabId>,
}

impl RecentTabs {
    pub fn new() -> RecentTabs {
        RecentTabs::default()
    }

    pub fn restore(entries: Vec<TabId>, limit: usize) -> RecentTabs {
        let mut recents = RecentTabs { entries };
        recents.entries.truncate(limit);
        recents
    }

    pub fn entries(&self) -> &[TabId] {
        &self.entries
    }

    /// Move `id` to the front and drop anything past `limit`. The limit is
    /// applied at record time so a lowered setting takes effect on the next
    /// activation rather than requiring a rebuild.
    pub fn note_activation(&mut self, id: TabId, limit: usize) {
        self.entries.retain(|e| *e != id);
        self.entries.insert(0, id);
        self.entries.truncate(limit);
    }

    pub fn remove(&mut self, id: TabId) {
        self.entries.retain(|e| *e != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_most_recent_first_within_limit() {
        let mut recents = RecentTabs::new();
        for id in [1, 2, 3] {
            recents.note_activation(id, 2);
        }

        assert_eq!(recents.entries(), &[3, 2]);
    }

    #[test]
    fn test_reactivation_moves_to_front_without_duplicating() {
        let mut recents = RecentTabs::new();
        for id in [1, 2, 1] {
            recents.note_activation(id, 3);
        }

        assert_eq!(recents.entries(), &[1, 2]);
    }

    #[test]
    fn test_remove_closed_tab() {
        let mut recents = RecentTabs::new();
        for id in [1, 2, 3] {
            recents.note_activation(id, 3);
        }

        recents.remove(2);
        assert_eq!(recents.entries(), &[3, 1]);

        // Removing an absent id is a no-op.
        recents.remove(9);
        assert_eq!(recents.entries(), &[3, 1]);
    }

    #[test]
    fn test_restore_applies_limit() {
        let recents = RecentTabs::restore(vec![4, 5, 6, 7], 2);
        assert_eq!(recents.entries(), &[4, 5]);
    }
}
