use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Args, Subcommand};
use db::{
    DBService,
    models::local_story::{CreationStep, LocalStory, SaveLocalStory, StoryPage},
};
use services::services::story_markdown::{export_markdown, import_markdown, split_paragraphs};
use utils::text::preview;

use super::{AppContext, confirm};

#[derive(Subcommand, Debug)]
pub enum DraftsCommand {
    /// Drafts on this machine, most recently edited first
    List,
    /// Print a draft with its pages
    Show { id: String },
    /// Create a draft (or replace its pages) from a page markdown file
    Import(PagesArgs),
    /// Create a draft (or replace its pages) with one page per paragraph
    Split(PagesArgs),
    /// Print a draft's pages as markdown
    Export {
        id: String,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Change the title, audience or style of a draft
    Set(SetArgs),
    /// Add, remove or edit single pages
    #[command(subcommand)]
    Page(PageCommand),
    /// Move a draft to another creation step
    Step { id: String, step: CreationStep },
    Remove {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct PagesArgs {
    pub file: PathBuf,
    /// Title of the new draft (defaults to the file name)
    #[arg(long, short, conflicts_with = "into")]
    pub title: Option<String>,
    /// Replace the pages of this existing draft
    #[arg(long)]
    pub into: Option<String>,
    /// Illustration style applied to every page
    #[arg(long)]
    pub style: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub id: String,
    #[arg(long, short)]
    pub title: Option<String>,
    /// Reader age group, e.g. 3-5
    #[arg(long)]
    pub age: Option<String>,
    /// Target word count
    #[arg(long)]
    pub words: Option<i32>,
    #[arg(long)]
    pub lang: Option<String>,
    /// Illustration style for the draft and all of its pages
    #[arg(long)]
    pub style: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PageCommand {
    /// Insert a blank page
    Add {
        id: String,
        /// Position of the new page (defaults to the end)
        #[arg(long)]
        at: Option<usize>,
    },
    /// Delete a page; the last remaining page cannot be removed
    Remove { id: String, page: usize },
    /// Change the text or illustration hint of a page
    Set {
        id: String,
        page: usize,
        #[arg(long)]
        cn: Option<String>,
        #[arg(long)]
        en: Option<String>,
        #[arg(long)]
        hint: Option<String>,
    },
}

pub async fn run(ctx: &AppContext, cmd: DraftsCommand) -> anyhow::Result<()> {
    let db = ctx.drafts().await?;
    execute(&db, cmd).await
}

async fn execute(db: &DBService, cmd: DraftsCommand) -> anyhow::Result<()> {
    let pool = &db.pool;

    match cmd {
        DraftsCommand::List => {
            for draft in LocalStory::list(pool).await? {
                println!(
                    "{}  {:<8} {:>3} pages  {}  {}",
                    draft.id,
                    draft.step,
                    draft.pages.len(),
                    draft.updated_at.format("%Y-%m-%d %H:%M"),
                    preview(&draft.title, 30)
                );
            }
        }
        DraftsCommand::Show { id } => {
            let draft = require(db, &id).await?;
            println!("{} ({})", draft.title, draft.id);
            println!(
                "step: {}  lang: {}  age: {}  words: {}  style: {}",
                draft.step,
                draft.lang,
                draft.age.as_deref().unwrap_or("-"),
                draft
                    .words
                    .map_or_else(|| "-".to_string(), |w| w.to_string()),
                draft.style_id.as_deref().unwrap_or("-")
            );
            println!();
            print!("{}", export_markdown(&draft.pages));
        }
        DraftsCommand::Import(args) => {
            let text = read(&args.file)?;
            let pages = import_markdown(&text, args.style.as_deref())?;
            store_pages(db, &args, pages).await?;
        }
        DraftsCommand::Split(args) => {
            let text = read(&args.file)?;
            let pages = split_paragraphs(&text, args.style.as_deref())?;
            store_pages(db, &args, pages).await?;
        }
        DraftsCommand::Export { id, output } => {
            let markdown = export_markdown(&require(db, &id).await?.pages);
            match output {
                Some(path) => std::fs::write(&path, markdown)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{markdown}"),
            }
        }
        DraftsCommand::Set(args) => {
            if args.title.is_none()
                && args.age.is_none()
                && args.words.is_none()
                && args.lang.is_none()
                && args.style.is_none()
            {
                bail!("nothing to change: pass at least one of --title, --age, --words, --lang, --style");
            }
            let saved = edit(db, &args.id, |data| {
                if let Some(title) = args.title {
                    data.title = title;
                }
                if let Some(age) = args.age {
                    data.age = Some(age);
                }
                if let Some(words) = args.words {
                    data.words = Some(words);
                }
                if let Some(lang) = args.lang {
                    data.lang = lang;
                }
                if let Some(style) = args.style {
                    data.apply_style(Some(style));
                }
                Ok(())
            })
            .await?;
            println!("updated {}", saved.id);
        }
        DraftsCommand::Page(cmd) => edit_page(db, cmd).await?,
        DraftsCommand::Step { id, step } => {
            let saved = edit(db, &id, |data| {
                data.step = step;
                Ok(())
            })
            .await?;
            println!("{} is now at step {}", saved.id, saved.step);
        }
        DraftsCommand::Remove { id, yes } => {
            if !confirm(&format!("Remove draft {id}?"), yes)? {
                return Ok(());
            }
            if !LocalStory::remove(pool, &id).await? {
                return Err(anyhow!("no draft with id {id}"));
            }
            println!("removed {id}");
        }
    }

    Ok(())
}

async fn edit_page(db: &DBService, cmd: PageCommand) -> anyhow::Result<()> {
    match cmd {
        PageCommand::Add { id, at } => {
            let mut added = 0;
            let saved = edit(db, &id, |data| {
                added = at.unwrap_or(data.pages.len() + 1);
                data.insert_page(added)?;
                Ok(())
            })
            .await?;
            println!("added page {added}, {} now has {} pages", saved.id, saved.pages.len());
        }
        PageCommand::Remove { id, page } => {
            let saved = edit(db, &id, |data| {
                data.remove_page(page)?;
                Ok(())
            })
            .await?;
            println!("removed page {page}, {} now has {} pages", saved.id, saved.pages.len());
        }
        PageCommand::Set {
            id,
            page,
            cn,
            en,
            hint,
        } => {
            if cn.is_none() && en.is_none() && hint.is_none() {
                bail!("nothing to change: pass at least one of --cn, --en, --hint");
            }
            edit(db, &id, |data| {
                let target = data.page_mut(page)?;
                if let Some(cn) = cn {
                    target.text_cn = cn;
                }
                if let Some(en) = en {
                    target.text_en = en;
                }
                if let Some(hint) = hint {
                    target.image_hint = hint;
                }
                Ok(())
            })
            .await?;
            println!("updated page {page} of {id}");
        }
    }
    Ok(())
}

async fn require(db: &DBService, id: &str) -> anyhow::Result<LocalStory> {
    LocalStory::load(&db.pool, id)
        .await?
        .ok_or_else(|| anyhow!("no draft with id {id}"))
}

/// Load a draft, change it and store it again.
async fn edit<F>(db: &DBService, id: &str, change: F) -> anyhow::Result<LocalStory>
where
    F: FnOnce(&mut SaveLocalStory) -> anyhow::Result<()>,
{
    let mut data = SaveLocalStory::from(&require(db, id).await?);
    change(&mut data)?;
    Ok(LocalStory::save(&db.pool, &data).await?)
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

async fn store_pages(
    db: &DBService,
    args: &PagesArgs,
    pages: Vec<StoryPage>,
) -> anyhow::Result<LocalStory> {
    let data = match &args.into {
        Some(id) => SaveLocalStory::from(&require(db, id).await?).with_pages(pages),
        None => {
            let title = args.title.clone().unwrap_or_else(|| {
                args.file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "untitled".to_string())
            });
            let mut data = SaveLocalStory::new(title).with_pages(pages);
            data.style_id = args.style.clone();
            data
        }
    };

    let saved = LocalStory::save(&db.pool, &data).await?;
    println!("{}  {} pages  {}", saved.id, saved.pages.len(), saved.title);
    Ok(saved)
}
