use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use services::services::{
    story_query::{DEFAULT_PAGE_SIZE, SortKey, StoryQuery, category_counts},
    storybook_api::{Story, StoryUpdate},
};
use utils::text::{preview, single_line};

use super::{AppContext, confirm};

#[derive(Subcommand, Debug)]
pub enum StoriesCommand {
    /// List stories with filters, sorting and paging
    List(ListArgs),
    /// Change fields of a stored story
    Edit(EditArgs),
    /// Delete one or more stored stories
    Delete {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Download the selected stories as CSV
    Export {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Number of stories per category
    Stats,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, short)]
    pub category: Option<String>,
    /// Text to look for in titles and content
    #[arg(long, short)]
    pub search: Option<String>,
    /// Earliest creation date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Latest creation date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
    /// title, category or created_at
    #[arg(long)]
    pub sort: Option<SortKey>,
    #[arg(long)]
    pub desc: bool,
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub source: Option<String>,
}

pub async fn run(ctx: &AppContext, cmd: StoriesCommand) -> anyhow::Result<()> {
    let client = ctx.client()?;

    match cmd {
        StoriesCommand::List(args) => {
            let stories = client.list_stories(args.category.as_deref()).await?;
            let query = StoryQuery {
                category: args.category,
                search: args.search,
                created_from: args.from,
                created_to: args.to,
                sort: args.sort,
                descending: args.desc,
                page: args.page,
                page_size: args.page_size,
            };
            let paged = query.apply(&stories);

            for story in &paged.items {
                println!("{}", story_line(story));
            }
            println!(
                "page {}/{}, {} stories",
                paged.page,
                paged.page_count.max(1),
                paged.total
            );
        }
        StoriesCommand::Edit(args) => {
            let update = StoryUpdate {
                title: args.title,
                category: args.category,
                content: args.content,
                source: args.source,
            };
            if update.is_empty() {
                bail!("nothing to change: pass at least one of --title, --category, --content, --source");
            }
            println!("{}", client.update_story(args.id, &update).await?);
        }
        StoriesCommand::Delete { ids, yes } => {
            let prompt = match ids.as_slice() {
                [id] => format!("Delete story {id}?"),
                _ => format!("Delete {} stories?", ids.len()),
            };
            if confirm(&prompt, yes)? {
                let message = match ids.as_slice() {
                    [id] => client.delete_story(*id).await?,
                    _ => client.batch_delete_stories(&ids).await?,
                };
                println!("{message}");
            }
        }
        StoriesCommand::Export { ids, output } => {
            let csv = client.batch_export_stories(&ids).await?;
            std::fs::write(&output, &csv)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("wrote {} stories to {}", ids.len(), output.display());
        }
        StoriesCommand::Stats => {
            let stories = client.list_stories(None).await?;
            for (category, count) in category_counts(&stories) {
                println!("{count:>5}  {category}");
            }
            println!("{:>5}  total", stories.len());
        }
    }

    Ok(())
}

fn story_line(story: &Story) -> String {
    let created = story
        .created_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>5}  {created:<10}  [{}] {}  {}",
        story.id,
        story.category,
        story.title,
        preview(&single_line(&story.content), 40)
    )
}
