//! Selection set for bulk actions

use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one id. Returns whether it is now selected.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_owned());
            true
        }
    }

    /// Select every visible id, or deselect them all when all are already
    /// selected. Ids outside `visible` are left alone.
    pub fn toggle_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>) {
        let visible: Vec<&str> = visible.into_iter().collect();
        if visible.is_empty() {
            return;
        }
        if visible.iter().all(|id| self.ids.contains(*id)) {
            for id in visible {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(visible.into_iter().map(str::to_owned));
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids no longer present in the collection. Returns how many went.
    pub fn retain_present(&mut self, present: &HashSet<&str>) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| present.contains(id.as_str()));
        before - self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}
