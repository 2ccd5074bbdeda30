use std::path::PathBuf;

use clap::Args;

use super::AppContext;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// CSV file of stories
    pub file: PathBuf,
}

pub async fn run(ctx: &AppContext, args: UploadArgs) -> anyhow::Result<()> {
    let summary = ctx.client()?.upload_csv(&args.file).await?;
    if !summary.message.is_empty() {
        println!("{}", summary.message);
    }
    println!(
        "saved {}, skipped {} duplicates",
        summary.success_count, summary.duplicate_count
    );
    Ok(())
}
