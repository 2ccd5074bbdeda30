//! Filtering, sorting and paging of story lists fetched in full from the server.

use std::{cmp::Ordering, collections::BTreeMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::storybook_api::Story;

pub const DEFAULT_PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortKey {
    Title,
    Category,
    CreatedAt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryQuery {
    pub category: Option<String>,
    /// Substring of the title or the content.
    pub search: Option<String>,
    /// Inclusive bounds on the creation date.
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    /// `None` keeps the server's order.
    pub sort: Option<SortKey>,
    pub descending: bool,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for StoryQuery {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            created_from: None,
            created_to: None,
            sort: None,
            descending: false,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_count: usize,
    /// Matches across all pages.
    pub total: usize,
}

impl StoryQuery {
    pub fn matches(&self, story: &Story) -> bool {
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if story.category != category {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            if !story.title.contains(search) && !story.content.contains(search) {
                return false;
            }
        }

        if self.created_from.is_some() || self.created_to.is_some() {
            let Some(created) = story.created_at.map(|dt| dt.date()) else {
                return false;
            };
            if self.created_from.is_some_and(|from| created < from)
                || self.created_to.is_some_and(|to| created > to)
            {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, stories: &'a [Story]) -> Paged<&'a Story> {
        let mut matched: Vec<&Story> = stories.iter().filter(|s| self.matches(s)).collect();

        if let Some(key) = self.sort {
            matched.sort_by(|a, b| {
                let ord = compare(a, b, key);
                if self.descending { ord.reverse() } else { ord }
            });
        }

        let page_size = self.page_size.max(1);
        let page = self.page.max(1);
        let total = matched.len();
        let items = matched
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Paged {
            items,
            page,
            page_count: total.div_ceil(page_size),
            total,
        }
    }
}

fn compare(a: &Story, b: &Story, key: SortKey) -> Ordering {
    match key {
        SortKey::Title => a.title.cmp(&b.title),
        SortKey::Category => a.category.cmp(&b.category),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

/// Number of stories per category, by category name.
pub fn category_counts(stories: &[Story]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for story in stories.iter().filter(|s| !s.category.is_empty()) {
        *counts.entry(story.category.clone()).or_insert(0) += 1;
    }
    counts
}
