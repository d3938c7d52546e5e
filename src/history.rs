/// Tab activation history
///
/// An ordered, position-addressable record of tab activations: position 0 is
/// the most recent activation, the cursor is where navigation currently
/// stands. Pure state machine; the host calls that actually activate tabs
/// live in the session, which drives this through the methods below.
use crate::tab_data::TabId;
use serde::{Deserialize, Serialize};

/// Hard cap on tracked activations.
pub const MAX_HISTORY: usize = 50;

/// Which of the two history designs is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStyle {
    /// Reference behavior: a cursor walks the sequence, activating a tab
    /// while rewound prunes the abandoned branch, and recording is
    /// suppressed while a programmatic jump is in flight.
    PositionAware,
    /// Simple variant: every navigation works relative to the front of the
    /// list, there is no forward traversal and no suppression. Backward
    /// navigation toggles between the two most recent tabs.
    FrontOnly,
}

/// Persisted shape of the history (entries plus cursor, one storage key).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub entries: Vec<TabId>,
    #[serde(default)]
    pub cursor: usize,
}

#[derive(Debug)]
pub struct TabHistory {
    entries: Vec<TabId>,
    cursor: usize,
    navigating: bool,
    style: HistoryStyle,
}

impl TabHistory {
    pub fn new(style: HistoryStyle) -> TabHistory {
        TabHistory {
            entries: Vec::new(),
            cursor: 0,
            navigating: false,
            style,
        }
    }

    /// Rebuild from persisted state, keeping only entries `known` accepts
    /// (tabs can close while the service worker is asleep).
    pub fn restore(
        style: HistoryStyle,
        snapshot: HistorySnapshot,
        known: impl Fn(TabId) -> bool,
    ) -> TabHistory {
        let mut entries: Vec<TabId> = snapshot.entries;
        entries.retain(|id| known(*id));
        entries.truncate(MAX_HISTORY);
        let cursor = match style {
            HistoryStyle::PositionAware if !entries.is_empty() => {
                snapshot.cursor.min(entries.len() - 1)
            }
            _ => 0,
        };
        TabHistory {
            entries,
            cursor,
            navigating: false,
            style,
        }
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            entries: self.entries.clone(),
            cursor: self.cursor,
        }
    }

    pub fn entries(&self) -> &[TabId] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating
    }

    /// Record a real tab activation.
    ///
    /// Ignored while a programmatic jump is in flight: the jump itself
    /// fires the same activation event, and recording it would corrupt the
    /// back/forward stack. If the cursor is rewound, everything ahead of it
    /// (the abandoned "future" branch) is discarded first.
    pub fn record_activation(&mut self, id: TabId) {
        if self.navigating {
            return;
        }

        if self.style == HistoryStyle::PositionAware && self.cursor > 0 {
            self.entries.drain(..self.cursor);
            self.cursor = 0;
        }

        self.entries.retain(|e| *e != id);
        self.entries.insert(0, id);
        self.entries.truncate(MAX_HISTORY);
    }

    /// Drop a closed tab wherever it sits, keeping the cursor on the entry
    /// it pointed at (or the nearest one still in bounds).
    pub fn remove(&mut self, id: TabId) {
        let Some(index) = self.entries.iter().position(|e| *e == id) else {
            return;
        };
        self.entries.remove(index);
        if index < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.entries.len() {
            self.cursor = self.entries.len().saturating_sub(1);
        }
    }

    /// Position one step further back, if there is one.
    pub fn back_target(&self) -> Option<usize> {
        match self.style {
            HistoryStyle::PositionAware => {
                let target = self.cursor + 1;
                (target < self.entries.len()).then_some(target)
            }
            HistoryStyle::FrontOnly => (self.entries.len() >= 2).then_some(1),
        }
    }

    /// Position one step forward, if navigation has somewhere to return to.
    pub fn forward_target(&self) -> Option<usize> {
        match self.style {
            HistoryStyle::PositionAware => self.cursor.checked_sub(1),
            HistoryStyle::FrontOnly => None,
        }
    }

    pub fn entry_at(&self, position: usize) -> Option<TabId> {
        self.entries.get(position).copied()
    }

    /// Mark a programmatic jump to `position` as in flight. In the
    /// front-only style there is no cursor to move and no suppression.
    pub fn begin_jump(&mut self, position: usize) {
        if self.style == HistoryStyle::PositionAware {
            self.cursor = position;
            self.navigating = true;
        }
    }

    pub fn end_jump(&mut self) {
        self.navigating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_aware() -> TabHistory {
        TabHistory::new(HistoryStyle::PositionAware)
    }

    #[test]
    fn test_activations_prepend() {
        let mut history = position_aware();
        for id in [1, 2, 3] {
            history.record_activation(id);
        }

        assert_eq!(history.entries(), &[3, 2, 1]);
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_reactivation_moves_to_front() {
        let mut history = position_aware();
        for id in [1, 2, 3, 1] {
            history.record_activation(id);
        }

        assert_eq!(history.entries(), &[1, 3, 2]);
    }

    #[test]
    fn test_truncates_at_capacity() {
        let mut history = position_aware();
        for id in 0..(MAX_HISTORY as i32 + 10) {
            history.record_activation(id);
        }

        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history.entry_at(0), Some(MAX_HISTORY as i32 + 9));
    }

    #[test]
    fn test_back_and_forward_targets() {
        let mut history = position_aware();
        for id in [1, 2, 3] {
            history.record_activation(id);
        }

        assert_eq!(history.back_target(), Some(1));
        history.begin_jump(1);
        history.end_jump();

        // Sequence untouched by navigation, only the cursor moved.
        assert_eq!(history.entries(), &[3, 2, 1]);
        assert_eq!(history.forward_target(), Some(0));
        assert_eq!(history.back_target(), Some(2));
    }

    #[test]
    fn test_back_past_the_end_is_a_no_op() {
        let mut history = position_aware();
        history.record_activation(1);

        assert_eq!(history.back_target(), None);
        assert_eq!(history.forward_target(), None);
    }

    #[test]
    fn test_activation_while_rewound_prunes_the_branch() {
        let mut history = position_aware();
        for id in [1, 2, 3] {
            history.record_activation(id);
        }
        history.begin_jump(1);
        history.end_jump();

        history.record_activation(4);

        // Tab 3 (ahead of the cursor) is discarded.
        assert_eq!(history.entries(), &[4, 2, 1]);
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_recording_is_suppressed_mid_jump() {
        let mut history = position_aware();
        for id in [1, 2, 3] {
            history.record_activation(id);
        }

        history.begin_jump(2);
        // The activation event caused by the jump itself.
        history.record_activation(1);
        assert_eq!(history.entries(), &[3, 2, 1]);
        assert_eq!(history.cursor(), 2);

        history.end_jump();
        history.record_activation(5);
        assert_eq!(history.entries(), &[5, 1]);
    }

    #[test]
    fn test_remove_adjusts_cursor() {
        let mut history = position_aware();
        for id in [1, 2, 3, 4] {
            history.record_activation(id);
        }
        // entries [4,3,2,1], cursor at 2 (tab 2).
        history.begin_jump(2);
        history.end_jump();

        history.remove(4);
        assert_eq!(history.entries(), &[3, 2, 1]);
        assert_eq!(history.cursor(), 1);
        assert_eq!(history.entry_at(history.cursor()), Some(2));

        history.remove(1);
        history.remove(2);
        assert_eq!(history.entries(), &[3]);
        assert_eq!(history.cursor(), 0);

        history.remove(3);
        assert!(history.is_empty());
        assert_eq!(history.cursor(), 0);

        // Removing from an empty history is a no-op.
        history.remove(3);
        assert!(history.is_empty());
    }

    #[test]
    fn test_front_only_back_is_always_position_one() {
        let mut history = TabHistory::new(HistoryStyle::FrontOnly);
        history.record_activation(1);
        assert_eq!(history.back_target(), None);

        history.record_activation(2);
        assert_eq!(history.back_target(), Some(1));
        assert_eq!(history.forward_target(), None);

        // No suppression in this style: the jump's own activation event
        // re-records, which is what makes repeated back toggle two tabs.
        history.begin_jump(1);
        history.record_activation(1);
        assert_eq!(history.entries(), &[1, 2]);
        assert_eq!(history.back_target(), Some(1));
    }

    #[test]
    fn test_restore_drops_unknown_tabs_and_clamps_cursor() {
        let snapshot = HistorySnapshot {
            entries: vec![5, 6, 7, 8],
            cursor: 3,
        };
        let history = TabHistory::restore(HistoryStyle::PositionAware, snapshot, |id| id != 8);

        assert_eq!(history.entries(), &[5, 6, 7]);
        assert_eq!(history.cursor(), 2);
        assert!(!history.is_navigating());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut history = position_aware();
        for id in [1, 2, 3] {
            history.record_activation(id);
        }
        history.begin_jump(1);
        history.end_jump();

        let json = serde_json::to_string(&history.snapshot()).unwrap();
        let snapshot: HistorySnapshot = serde_json::from_str(&json).unwrap();
        let restored = TabHistory::restore(HistoryStyle::PositionAware, snapshot, |_| true);

        assert_eq!(restored.entries(), &[3, 2, 1]);
        assert_eq!(restored.cursor(), 1);
    }
}
