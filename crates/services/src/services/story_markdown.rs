//! Plain-text page formats used by the story editor: the markdown page
//! export/import and the blank-line paragraph splitter.

use std::sync::LazyLock;

use db::models::local_story::StoryPage;
use regex::Regex;
use thiserror::Error;

const TEXT_LABEL: &str = "文本：";
const IMAGE_LABEL: &str = "画面建议：";

static PAGE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"🖼 Page \d+").expect("page header pattern is valid"));

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkdownError {
    #[error("no pages found: expected blocks starting with \"🖼 Page <n>\"")]
    NoPages,
    #[error("no paragraphs found")]
    NoParagraphs,
}

pub fn export_markdown(pages: &[StoryPage]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let english = if page.text_en.is_empty() {
                String::new()
            } else {
                format!("{}\n", page.text_en)
            };
            format!(
                "🖼 Page {}\n{TEXT_LABEL}\n{}\n{english}\n{IMAGE_LABEL}\n{}\n",
                i + 1,
                page.text_cn,
                page.image_hint
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse text produced by [`export_markdown`] (or written by hand in the same
/// shape). Anything before the first page header is ignored and pages are
/// renumbered from 1.
pub fn import_markdown(
    text: &str,
    style_id: Option<&str>,
) -> Result<Vec<StoryPage>, MarkdownError> {
    let Some(first) = PAGE_HEADER.find(text) else {
        return Err(MarkdownError::NoPages);
    };

    let pages: Vec<StoryPage> = PAGE_HEADER
        .split(&text[first.start()..])
        .filter(|block| !block.trim().is_empty())
        .enumerate()
        .map(|(i, block)| parse_block(block, page_no(i), style_id))
        .collect();

    if pages.is_empty() {
        return Err(MarkdownError::NoPages);
    }
    Ok(pages)
}

fn parse_block(block: &str, page_no: i32, style_id: Option<&str>) -> StoryPage {
    let (text_cn, text_en) = match block.find(TEXT_LABEL) {
        Some(start) => {
            let section = &block[start + TEXT_LABEL.len()..];
            let section = section
                .find(IMAGE_LABEL)
                .map_or(section, |end| &section[..end]);
            let mut lines = section
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty());
            (
                lines.next().unwrap_or_default().to_string(),
                lines.next().unwrap_or_default().to_string(),
            )
        }
        None => (String::new(), String::new()),
    };

    let image_hint = block
        .find(IMAGE_LABEL)
        .map(|start| block[start + IMAGE_LABEL.len()..].trim().to_string())
        .unwrap_or_default();

    StoryPage {
        page_no,
        text_cn,
        text_en,
        image_hint,
        style_id: style_id.map(str::to_string),
    }
}

/// One page per blank-line separated paragraph, Chinese text only.
pub fn split_paragraphs(
    text: &str,
    style_id: Option<&str>,
) -> Result<Vec<StoryPage>, MarkdownError> {
    let normalized = text.replace("\r\n", "\n");
    let pages: Vec<StoryPage> = PARAGRAPH_BREAK
        .split(&normalized)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .enumerate()
        .map(|(i, paragraph)| StoryPage {
            text_cn: paragraph.to_string(),
            ..StoryPage::blank(page_no(i), style_id.map(str::to_string))
        })
        .collect();

    if pages.is_empty() {
        return Err(MarkdownError::NoParagraphs);
    }
    Ok(pages)
}

fn page_no(index: usize) -> i32 {
    i32::try_from(index + 1).unwrap_or(i32::MAX)
}
