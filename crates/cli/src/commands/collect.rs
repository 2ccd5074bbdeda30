use std::{future::Future, path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use services::services::{
    batch_collector::{AttemptReport, BatchCollector, CollectionRequest, Severity},
    storybook_api::StorybookGenerator,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use utils::text::{preview, single_line};

use super::AppContext;

/// 128 + SIGINT, as shells report an interrupted command.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Category the stories belong to
    #[arg(long, short)]
    pub category: String,

    /// What kind of stories to generate
    #[arg(long, short)]
    pub prompt: String,

    /// Stories to collect, 1-100 (default from config)
    #[arg(long, short = 'n')]
    pub count: Option<u32>,

    /// Stories requested per call, 1-50 (default from config)
    #[arg(long, short)]
    pub batch_size: Option<u32>,

    /// Also write the collected stories to this file as JSON
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run(ctx: &AppContext, args: CollectArgs) -> anyhow::Result<ExitCode> {
    let request = CollectionRequest {
        category: args.category,
        prompt: args.prompt,
        target_count: args.count.unwrap_or(ctx.config.collection.target_count),
        batch_size: args.batch_size.unwrap_or(ctx.config.collection.batch_size),
    };
    request.validate()?;
    ctx.config.require_model()?;

    let generator = StorybookGenerator::new(
        ctx.client()?,
        ctx.config.generation.clone(),
        ctx.config.api.api_key().map(str::to_string),
    );
    let collector = BatchCollector::new(generator);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let ctrl_c = || async { tokio::signal::ctrl_c().await.is_ok() };
            if watch_interrupts(ctrl_c, cancel).await {
                eprintln!("aborted");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
    };

    let bar = ProgressBar::new(u64::from(request.target_count));
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    bar.set_message(format!("batch 1/{}, 0 collected", request.planned_attempts()));
    bar.enable_steady_tick(Duration::from_millis(120));

    let result = collector
        .collect(&request, &cancel, |report: &AttemptReport| {
            bar.set_position(report.accumulated as u64);
            bar.set_message(batch_message(report));
        })
        .await;
    ctrl_c.abort();
    bar.finish_and_clear();
    let progress = result?;

    for (i, item) in progress.accumulated().iter().enumerate() {
        println!("{:>3}. {}", i + 1, item.title);
        if !item.body.is_empty() {
            println!("     {}", preview(&single_line(&item.body), 60));
        }
    }
    if !progress.duplicates().is_empty() {
        println!("duplicates: {}", progress.duplicates().join(", "));
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(progress.accumulated())?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }

    let (severity, reason) = progress
        .stop_reason()
        .map(|r| (r.severity(), r.message()))
        .unwrap_or((Severity::Ok, String::new()));
    eprintln!(
        "{}: {} ({} attempts, {reason})",
        severity_label(severity),
        progress.summary(),
        progress.attempts_made()
    );

    Ok(if severity == Severity::Error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// The first interrupt cancels the run between batches. Returns `true` on a
/// second interrupt, while the in-flight batch is still running.
async fn watch_interrupts<F, Fut>(mut interrupted: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !interrupted().await {
        return false;
    }
    info!("Cancelling after the current batch");
    cancel.cancel();
    eprintln!("finishing the current batch, press Ctrl-C again to quit now");

    interrupted().await
}

fn batch_message(report: &AttemptReport) -> String {
    format!(
        "batch {}/{}, {} collected",
        report.attempt, report.attempts_planned, report.accumulated
    )
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "done",
        Severity::Info => "note",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}
