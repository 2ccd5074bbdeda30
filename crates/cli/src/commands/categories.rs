use clap::Subcommand;

use super::{AppContext, confirm};

#[derive(Subcommand, Debug)]
pub enum CategoriesCommand {
    List,
    Add {
        name: String,
    },
    Rename {
        id: i64,
        name: String,
    },
    Delete {
        id: i64,
        #[arg(long, short)]
        yes: bool,
    },
}

pub async fn run(ctx: &AppContext, cmd: CategoriesCommand) -> anyhow::Result<()> {
    let client = ctx.client()?;

    match cmd {
        CategoriesCommand::List => {
            for category in client.list_categories().await? {
                println!("{:>5}  {}", category.id, category.name);
            }
        }
        CategoriesCommand::Add { name } => {
            println!("{}", client.create_category(name.trim()).await?);
        }
        CategoriesCommand::Rename { id, name } => {
            println!("{}", client.rename_category(id, name.trim()).await?);
        }
        CategoriesCommand::Delete { id, yes } => {
            if confirm(&format!("Delete category {id}?"), yes)? {
                println!("{}", client.delete_category(id).await?);
            }
        }
    }

    Ok(())
}
