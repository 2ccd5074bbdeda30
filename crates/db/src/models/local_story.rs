use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type, types::Json};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageEditError {
    #[error("page {page_no} does not exist, the draft has {len} pages")]
    OutOfRange { page_no: usize, len: usize },
    #[error("a draft keeps at least one page")]
    LastPage,
}

/// Stage of the story creation wizard a draft has reached.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default,
)]
#[sqlx(type_name = "creation_step", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CreationStep {
    #[default]
    Theme,
    Script,
    Prompts,
    Images,
    Export,
}

/// One illustrated page of a draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StoryPage {
    pub page_no: i32,
    #[serde(default)]
    pub text_cn: String,
    #[serde(default)]
    pub text_en: String,
    #[serde(default)]
    pub image_hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
}

impl StoryPage {
    pub fn blank(page_no: i32, style_id: Option<String>) -> Self {
        Self {
            page_no,
            style_id,
            ..Default::default()
        }
    }
}

/// A story draft kept on this machine while it moves through the wizard.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LocalStory {
    pub id: String,
    pub title: String,
    pub style_id: Option<String>,
    pub age: Option<String>,
    pub lang: String,
    pub words: Option<i32>,
    pub step: CreationStep,
    #[sqlx(json)]
    pub pages: Vec<StoryPage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveLocalStory {
    /// `None` stores a new draft under a freshly generated id.
    pub id: Option<String>,
    pub title: String,
    pub style_id: Option<String>,
    pub age: Option<String>,
    pub lang: String,
    pub words: Option<i32>,
    pub step: CreationStep,
    pub pages: Vec<StoryPage>,
}

impl SaveLocalStory {
    /// New draft with a single empty page, as the editor starts out.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            style_id: None,
            age: None,
            lang: "zh".to_string(),
            words: None,
            step: CreationStep::Theme,
            pages: vec![StoryPage::blank(1, None)],
        }
    }

    pub fn with_pages(mut self, pages: Vec<StoryPage>) -> Self {
        self.pages = pages;
        self
    }

    /// Insert a blank page in the draft's style so that it becomes page
    /// `page_no` (1-based). `len + 1` appends.
    pub fn insert_page(&mut self, page_no: usize) -> Result<&mut StoryPage, PageEditError> {
        let len = self.pages.len();
        if page_no == 0 || page_no > len + 1 {
            return Err(PageEditError::OutOfRange { page_no, len });
        }
        let idx = page_no - 1;
        self.pages.insert(idx, StoryPage::blank(0, self.style_id.clone()));
        self.renumber();
        Ok(&mut self.pages[idx])
    }

    pub fn remove_page(&mut self, page_no: usize) -> Result<StoryPage, PageEditError> {
        let idx = self.index_of(page_no)?;
        if self.pages.len() <= 1 {
            return Err(PageEditError::LastPage);
        }
        let removed = self.pages.remove(idx);
        self.renumber();
        Ok(removed)
    }

    pub fn page_mut(&mut self, page_no: usize) -> Result<&mut StoryPage, PageEditError> {
        let idx = self.index_of(page_no)?;
        Ok(&mut self.pages[idx])
    }

    /// Sets the draft style and the style of every page.
    pub fn apply_style(&mut self, style_id: Option<String>) {
        for page in &mut self.pages {
            page.style_id = style_id.clone();
        }
        self.style_id = style_id;
    }

    fn index_of(&self, page_no: usize) -> Result<usize, PageEditError> {
        let len = self.pages.len();
        if page_no == 0 || page_no > len {
            return Err(PageEditError::OutOfRange { page_no, len });
        }
        Ok(page_no - 1)
    }

    fn renumber(&mut self) {
        for (no, page) in (1..).zip(&mut self.pages) {
            page.page_no = no;
        }
    }
}

impl From<&LocalStory> for SaveLocalStory {
    fn from(story: &LocalStory) -> Self {
        Self {
            id: Some(story.id.clone()),
            title: story.title.clone(),
            style_id: story.style_id.clone(),
            age: story.age.clone(),
            lang: story.lang.clone(),
            words: story.words,
            step: story.step,
            pages: story.pages.clone(),
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, title, style_id, age, lang, words, step, pages, created_at, updated_at";

impl LocalStory {
    /// Insert or overwrite a draft. `created_at` survives overwrites.
    pub async fn save(pool: &SqlitePool, data: &SaveLocalStory) -> Result<Self, sqlx::Error> {
        let id = data
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();

        sqlx::query_as::<_, LocalStory>(&format!(
            r#"INSERT INTO local_stories
                (id, title, style_id, age, lang, words, step, pages, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                style_id = excluded.style_id,
                age = excluded.age,
                lang = excluded.lang,
                words = excluded.words,
                step = excluded.step,
                pages = excluded.pages,
                updated_at = excluded.updated_at
            RETURNING {SELECT_COLUMNS}"#
        ))
        .bind(&id)
        .bind(&data.title)
        .bind(&data.style_id)
        .bind(&data.age)
        .bind(&data.lang)
        .bind(data.words)
        .bind(data.step)
        .bind(Json(&data.pages))
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn load(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LocalStory>(&format!(
            "SELECT {SELECT_COLUMNS} FROM local_stories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// All drafts, most recently updated first.
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LocalStory>(&format!(
            "SELECT {SELECT_COLUMNS} FROM local_stories ORDER BY updated_at DESC, id ASC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Returns `false` when no draft had that id.
    pub async fn remove(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM local_stories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::DBService;

    fn page(no: i32, cn: &str) -> StoryPage {
        StoryPage {
            page_no: no,
            text_cn: cn.to_string(),
            ..Default::default()
        }
    }

    fn numbers(data: &SaveLocalStory) -> Vec<i32> {
        data.pages.iter().map(|p| p.page_no).collect()
    }

    #[test]
    fn test_insert_page_renumbers_and_takes_draft_style() {
        let mut data = SaveLocalStory::new("pages").with_pages(vec![page(1, "一"), page(2, "二")]);
        data.style_id = Some("3".to_string());

        data.insert_page(2).unwrap().text_cn = "中间".to_string();
        data.insert_page(4).unwrap();

        let texts: Vec<_> = data.pages.iter().map(|p| p.text_cn.as_str()).collect();
        assert_eq!(texts, vec!["一", "中间", "二", ""]);
        assert_eq!(numbers(&data), vec![1, 2, 3, 4]);
        assert_eq!(data.pages[1].style_id.as_deref(), Some("3"));
        assert_eq!(
            data.insert_page(0).unwrap_err(),
            PageEditError::OutOfRange { page_no: 0, len: 4 }
        );
        assert!(data.insert_page(6).is_err());
    }

    #[test]
    fn test_remove_page_keeps_at_least_one() {
        let mut data =
            SaveLocalStory::new("pages").with_pages(vec![page(1, "一"), page(2, "二"), page(3, "三")]);

        assert_eq!(data.remove_page(2).unwrap().text_cn, "二");
        assert_eq!(numbers(&data), vec![1, 2]);
        assert_eq!(data.pages[1].text_cn, "三");

        assert_eq!(
            data.remove_page(3).unwrap_err(),
            PageEditError::OutOfRange { page_no: 3, len: 2 }
        );
        data.remove_page(1).unwrap();
        assert_eq!(data.remove_page(1).unwrap_err(), PageEditError::LastPage);
        assert_eq!(data.pages[0].page_no, 1);
    }

    #[test]
    fn test_apply_style_to_every_page() {
        let mut data = SaveLocalStory::new("pages").with_pages(vec![page(1, "一"), page(2, "二")]);
        data.page_mut(2).unwrap().image_hint = "森林".to_string();

        data.apply_style(Some("watercolor".to_string()));
        assert_eq!(data.style_id.as_deref(), Some("watercolor"));
        assert!(
            data.pages
                .iter()
                .all(|p| p.style_id.as_deref() == Some("watercolor"))
        );
        assert_eq!(data.pages[1].image_hint, "森林");

        data.apply_style(None);
        assert!(data.pages.iter().all(|p| p.style_id.is_none()));
        assert!(data.page_mut(3).is_err());
    }

    #[tokio::test]
    async fn test_save_generates_id_and_round_trips_pages() {
        let db = DBService::new_in_memory().await.unwrap();
        let data = SaveLocalStory::new("勇敢的小兔子")
            .with_pages(vec![page(1, "从前有一只小兔子"), page(2, "它很勇敢")]);

        let saved = LocalStory::save(&db.pool, &data).await.unwrap();
        assert!(!saved.id.is_empty());
        assert_eq!(saved.step, CreationStep::Theme);

        let loaded = LocalStory::load(&db.pool, &saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "勇敢的小兔子");
        assert_eq!(loaded.pages, data.pages);
    }

    #[tokio::test]
    async fn test_save_with_existing_id_overwrites() {
        let db = DBService::new_in_memory().await.unwrap();
        let first = LocalStory::save(&db.pool, &SaveLocalStory::new("draft"))
            .await
            .unwrap();

        let mut update = SaveLocalStory::from(&first);
        update.title = "renamed".to_string();
        update.step = CreationStep::Script;
        let second = LocalStory::save(&db.pool, &update).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "renamed");
        assert_eq!(second.step, CreationStep::Script);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(LocalStory::list(&db.pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_orders_by_most_recent_update() {
        let db = DBService::new_in_memory().await.unwrap();
        let a = LocalStory::save(&db.pool, &SaveLocalStory::new("a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = LocalStory::save(&db.pool, &SaveLocalStory::new("b")).await.unwrap();

        let ids: Vec<_> = LocalStory::list(&db.pool)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![b.id.clone(), a.id.clone()]);

        tokio::time::sleep(Duration::from_millis(5)).await;
        LocalStory::save(&db.pool, &SaveLocalStory::from(&a)).await.unwrap();
        let first = LocalStory::list(&db.pool).await.unwrap().remove(0);
        assert_eq!(first.id, a.id);
    }

    #[tokio::test]
    async fn test_remove() {
        let db = DBService::new_in_memory().await.unwrap();
        let saved = LocalStory::save(&db.pool, &SaveLocalStory::new("gone")).await.unwrap();

        assert!(LocalStory::remove(&db.pool, &saved.id).await.unwrap());
        assert!(!LocalStory::remove(&db.pool, &saved.id).await.unwrap());
        assert!(LocalStory::load(&db.pool, &saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("drafts.sqlite");

        let id = {
            let db = DBService::new(&path).await.unwrap();
            let saved = LocalStory::save(&db.pool, &SaveLocalStory::new("kept"))
                .await
                .unwrap();
            db.pool.close().await;
            saved.id
        };

        let db = DBService::new(&path).await.unwrap();
        assert!(LocalStory::load(&db.pool, &id).await.unwrap().is_some());
    }
}
