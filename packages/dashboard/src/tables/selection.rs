use std::collections::BTreeSet;

use super::RowId;

/// Selected row ids plus the "select all" checkbox.
///
/// Selecting all captures the ids present at that moment; any single toggle
/// afterwards clears the flag, since a partial selection is no longer "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<RowId>,
    all: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.all
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

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Flip one row. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        self.all = false;
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Flip the "select all" checkbox over `all_ids`.
    pub fn toggle_all<'a>(&mut self, all_ids: impl IntoIterator<Item = &'a str>) {
        if self.all {
            self.clear();
        } else {
            self.ids = all_ids.into_iter().map(str::to_string).collect();
            self.all = true;
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.all = false;
    }

    /// Drop ids that no longer exist after a reload. "All" survives only if it
    /// still covers exactly the current rows.
    pub fn retain_existing(&mut self, existing: &BTreeSet<&str>) {
        self.ids.retain(|id| existing.contains(id.as_str()));
        if self.all && self.ids.len() != existing.len() {
            self.all = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deselecting_after_select_all_clears_flag() {
        let mut selection = Selection::new();
        selection.toggle_all(["1", "2", "3"]);
        assert!(selection.is_all());

        assert!(!selection.toggle("2"));
        assert!(!selection.is_all());
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec!["1", "3"]);
    }

    #[test]
    fn toggle_all_twice_clears() {
        let mut selection = Selection::new();
        selection.toggle("1");
        selection.toggle_all(["1", "2"]);
        selection.toggle_all(["1", "2"]);
        assert!(selection.is_empty());
        assert!(!selection.is_all());
    }

    #[test]
    fn reload_keeps_surviving_ids() {
        let mut selection = Selection::new();
        selection.toggle_all(["a", "b"]);

        let same: BTreeSet<&str> = ["a", "b"].into_iter().collect();
        selection.retain_existing(&same);
        assert!(selection.is_all());

        let grown: BTreeSet<&str> = ["a", "b", "c"].into_iter().collect();
        selection.retain_existing(&grown);
        assert!(!selection.is_all());
        assert_eq!(selection.len(), 2);

        let shrunk: BTreeSet<&str> = ["b"].into_iter().collect();
        selection.retain_existing(&shrunk);
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec!["b"]);
    }
}
