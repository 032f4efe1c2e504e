//! Changelog feed: packaged release notes plus entries added from the
//! dashboard, which persist under their own storage key.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::Slot;
use crate::validation::ValidationErrors;

const PACKAGED_ENTRIES: &str = include_str!("../data/changelog.json");
const DEFAULT_AUTHOR: &str = "System";
const DEFAULT_AUTHOR_AVATAR: &str = "user07";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChangelogCategory {
    Announcement,
    BugFix,
    Product,
    ExcitingNews,
}

impl ChangelogCategory {
    pub const ALL: [ChangelogCategory; 4] = [
        ChangelogCategory::Announcement,
        ChangelogCategory::BugFix,
        ChangelogCategory::Product,
        ChangelogCategory::ExcitingNews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangelogCategory::Announcement => "Announcement",
            ChangelogCategory::BugFix => "Bug Fix",
            ChangelogCategory::Product => "Product",
            ChangelogCategory::ExcitingNews => "Exciting News",
        }
    }
}

impl fmt::Display for ChangelogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangelogCategory {
    type Err = String;

    /// Case-insensitive; the plural "Announcements" label is accepted too.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "announcement" | "announcements" => Ok(ChangelogCategory::Announcement),
            "bug fix" | "bugfix" | "bug-fix" => Ok(ChangelogCategory::BugFix),
            "product" => Ok(ChangelogCategory::Product),
            "exciting news" | "exciting-news" => Ok(ChangelogCategory::ExcitingNews),
            other => Err(format!("unknown changelog category '{other}'")),
        }
    }
}

impl TryFrom<String> for ChangelogCategory {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChangelogCategory> for String {
    fn from(category: ChangelogCategory) -> Self {
        category.as_str().to_string()
    }
}

/// The filter tabs above the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangelogFilter {
    #[default]
    All,
    Only(ChangelogCategory),
}

impl ChangelogFilter {
    pub fn label(&self) -> &'static str {
        match self {
            ChangelogFilter::All => "All",
            ChangelogFilter::Only(ChangelogCategory::Announcement) => "Announcements",
            ChangelogFilter::Only(category) => category.as_str(),
        }
    }

    pub fn matches(&self, entry: &ChangelogEntry) -> bool {
        match self {
            ChangelogFilter::All => true,
            ChangelogFilter::Only(category) => entry.category == *category,
        }
    }
}

impl FromStr for ChangelogFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(ChangelogFilter::All);
        }
        s.parse().map(ChangelogFilter::Only)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub title: String,
    pub category: ChangelogCategory,
    pub date: NaiveDate,
    pub author: Author,
    /// One paragraph per element
    #[serde(default)]
    pub body: Vec<String>,
}

/// The "add entry" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChangelogEntry {
    pub title: String,
    pub category: ChangelogCategory,
    pub date: NaiveDate,
    /// Blank means "System"
    pub author: String,
    /// Free text; each non-blank line becomes a paragraph
    pub body: String,
}

impl NewChangelogEntry {
    pub fn validate(&self) -> std::result::Result<ChangelogEntry, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = self.title.trim();
        if title.is_empty() {
            errors.add("title", "Title is required");
        }
        errors.into_result()?;

        let author = self.author.trim();
        Ok(ChangelogEntry {
            title: title.to_string(),
            category: self.category,
            date: self.date,
            author: Author {
                name: if author.is_empty() {
                    DEFAULT_AUTHOR.to_string()
                } else {
                    author.to_string()
                },
                avatar: Some(DEFAULT_AUTHOR_AVATAR.to_string()),
            },
            body: self
                .body
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

pub struct ChangelogFeed {
    packaged: Vec<ChangelogEntry>,
    user_entries: Slot,
}

impl ChangelogFeed {
    /// Feed with the release notes bundled into the binary.
    pub fn new(user_entries: Slot) -> Result<Self> {
        let packaged = serde_json::from_str(PACKAGED_ENTRIES)?;
        Ok(Self::with_packaged(packaged, user_entries))
    }

    pub fn with_packaged(packaged: Vec<ChangelogEntry>, user_entries: Slot) -> Self {
        Self {
            packaged,
            user_entries,
        }
    }

    /// Entries added from the dashboard, newest first.
    pub async fn user_entries(&self) -> Vec<ChangelogEntry> {
        self.user_entries.read_json().await
    }

    /// Date descending. On equal dates user entries come before packaged
    /// ones and keep their stored order.
    pub async fn entries(&self, filter: ChangelogFilter) -> Vec<ChangelogEntry> {
        let mut entries: Vec<ChangelogEntry> = self
            .user_entries()
            .await
            .into_iter()
            .chain(self.packaged.iter().cloned())
            .filter(|entry| filter.matches(entry))
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }

    pub async fn add(&self, entry: &NewChangelogEntry) -> Result<ChangelogEntry> {
        let entry = entry.validate()?;
        self.user_entries
            .update_json(|stored: &mut Vec<ChangelogEntry>| stored.insert(0, entry.clone()))
            .await?;
        tracing::info!(title = %entry.title, category = %entry.category, "Changelog entry added");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage, CHANGELOG_KEY};
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn feed() -> ChangelogFeed {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        ChangelogFeed::new(Slot::new(storage, CHANGELOG_KEY)).unwrap()
    }

    fn draft(title: &str, category: ChangelogCategory, on: &str) -> NewChangelogEntry {
        NewChangelogEntry {
            title: title.into(),
            category,
            date: date(on),
            author: String::new(),
            body: "First line\n\n  second line  \n".into(),
        }
    }

    #[test]
    fn categories_parse_both_spellings() {
        assert_eq!(
            "Announcements".parse::<ChangelogCategory>().unwrap(),
            ChangelogCategory::Announcement
        );
        assert_eq!(
            "bug fix".parse::<ChangelogCategory>().unwrap(),
            ChangelogCategory::BugFix
        );
        assert!("gossip".parse::<ChangelogCategory>().is_err());
    }

    #[test]
    fn plural_filter_matches_singular_category() {
        let filter: ChangelogFilter = "Announcements".parse().unwrap();
        assert_eq!(filter.label(), "Announcements");
        let entry = draft("x", ChangelogCategory::Announcement, "2025-01-01")
            .validate()
            .unwrap();
        assert!(filter.matches(&entry));
    }

    #[test]
    fn new_entry_splits_body_and_defaults_author() {
        let entry = draft("  Title ", ChangelogCategory::Product, "2025-01-01")
            .validate()
            .unwrap();
        assert_eq!(entry.title, "Title");
        assert_eq!(entry.body, vec!["First line", "second line"]);
        assert_eq!(entry.author.name, "System");

        let untitled = draft(" ", ChangelogCategory::Product, "2025-01-01");
        assert!(untitled.validate().unwrap_err().get("title").is_some());
    }

    #[test]
    fn packaged_entries_parse() {
        let packaged: Vec<ChangelogEntry> = serde_json::from_str(PACKAGED_ENTRIES).unwrap();
        assert!(!packaged.is_empty());
    }

    #[tokio::test]
    async fn feed_sorts_by_date_with_user_entries_first_on_ties() {
        let feed = feed();
        let packaged = feed.entries(ChangelogFilter::All).await;
        let newest = packaged[0].date;

        feed.add(&draft("Same day", ChangelogCategory::BugFix, &newest.to_string()))
            .await
            .unwrap();
        feed.add(&draft("Ancient", ChangelogCategory::BugFix, "2001-01-01"))
            .await
            .unwrap();

        let entries = feed.entries(ChangelogFilter::All).await;
        assert_eq!(entries[0].title, "Same day");
        assert_eq!(entries.last().unwrap().title, "Ancient");
        assert!(entries.windows(2).all(|w| w[0].date >= w[1].date));

        let bug_fixes = feed
            .entries(ChangelogFilter::Only(ChangelogCategory::BugFix))
            .await;
        assert!(bug_fixes
            .iter()
            .all(|e| e.category == ChangelogCategory::BugFix));
        assert_eq!(feed.user_entries().await[0].title, "Ancient");
    }
}
