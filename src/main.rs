//! `clipmark`: convert HTML files and URLs to Markdown through the task queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kodegen_tools_clipmark::task_queue::ProgressStage;
use kodegen_tools_clipmark::{
    Clipper, ClipperConfig, ConversionOptions, ConversionTask, OutputFormat, TaskObserver,
    TaskPayload, TaskStatus,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// Logs task progress through tracing
struct LogObserver;

impl TaskObserver for LogObserver {
    fn on_progress(&self, task: &ConversionTask, stage: ProgressStage) {
        debug!(task = %task.id, source = %task.payload.label(), ?stage, "Task progress");
    }

    fn on_complete(&self, task: &ConversionTask) {
        info!(source = %task.payload.label(), "Converted");
    }

    fn on_error(&self, task: &ConversionTask, error: &str) {
        warn!(source = %task.payload.label(), %error, "Conversion failed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = ClipperConfig::builder()
        .concurrency(usize::from(args.concurrency))
        .load_timeout_secs(args.load_timeout)
        .image_dir(args.image_dir.clone())
        .build()?;
    let clipper = Clipper::init(config)?;

    let format = OutputFormat::from(args.format);
    let options = ConversionOptions::default()
        .with_format(format)
        .with_download_images(args.download_images)
        .with_math(!args.no_math)
        .with_include_metadata(!args.no_metadata);

    let payloads: Vec<TaskPayload> = args.inputs.iter().map(|input| payload_for(input)).collect();
    let observer: Arc<dyn TaskObserver> = Arc::new(LogObserver);
    let tasks = clipper.queue().add_batch(payloads, options, Some(observer));
    clipper.queue().wait_idle().await;

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut failed = 0usize;
    for queued in &tasks {
        let Some(task) = clipper.queue().get_task(&queued.id) else {
            continue;
        };
        match (task.status, &task.result) {
            (TaskStatus::Completed, Some(result)) => {
                let target = output_path(&task.payload, &args.out_dir, format);
                tokio::fs::write(&target, &result.markdown)
                    .await
                    .with_context(|| format!("writing {}", target.display()))?;
                info!(
                    target = %target.display(),
                    words = result.metadata.word_count,
                    "Wrote {}",
                    result.title
                );
            }
            _ => failed += 1,
        }
    }

    let stats = clipper.queue().stats();
    info!(
        completed = stats.completed,
        failed = stats.failed,
        "Done"
    );
    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", tasks.len());
    }
    Ok(())
}

fn payload_for(input: &str) -> TaskPayload {
    if input.starts_with("http://") || input.starts_with("https://") {
        TaskPayload::url(input)
    } else {
        TaskPayload::file(input)
    }
}

fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Markdown | OutputFormat::PdfIntent => "md",
        OutputFormat::Text => "txt",
        // Never overwrite an .html input
        OutputFormat::Html => "clip.html",
    }
}

/// Files are written beside the input, URLs into `out_dir`.
fn output_path(payload: &TaskPayload, out_dir: &Path, format: OutputFormat) -> PathBuf {
    match payload {
        TaskPayload::File { path } => path.with_extension(extension(format)),
        TaskPayload::Url { url } => {
            let stem = url
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .replace('/', "_");
            let stem = sanitize_filename::sanitize(stem);
            let stem = if stem.is_empty() { "page".to_string() } else { stem };
            out_dir.join(format!("{stem}.{}", extension(format)))
        }
        TaskPayload::Selection { .. } => out_dir.join(format!("selection.{}", extension(format))),
    }
}
