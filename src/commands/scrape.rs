//! Scrape pipeline
//!
//! One invocation walks Authorizing -> Resolving -> Paginating -> Exporting ->
//! Delivering, reporting progress through a [`Reporter`]. The bot front-end
//! reports into a chat status message; the CLI reports into logs and files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::chat::{ChannelRef, Entity, JoinOutcome};
use crate::config::PROGRESS_EVERY;
use crate::error::{Error, Result};
use crate::export::{export, export_caption, export_file_name, ExportBuffer};
use crate::record::{map_message, MessageRecord};
use crate::source::{IdBounds, MessageSource, MessageStream};

pub const SCRAPING_TEXT: &str = "⏳ Scraping…";
pub const NO_MESSAGES_TEXT: &str = "No messages found for the given range/source.";

pub fn progress_text(processed: usize) -> String {
    format!("⏳ Scraping… {} messages processed…", processed)
}

/// Inclusive id range. `None` leaves that side open.
///
/// Ids are kept as given; message ids are `i32`, so a start beyond that
/// range admits nothing and an end beyond it admits everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageRange {
    pub start_id: Option<i64>,
    pub end_id: Option<i64>,
}

impl MessageRange {
    /// Exclusive bounds for the history request.
    pub fn bounds(&self) -> IdBounds {
        IdBounds {
            min_exclusive: self
                .start_id
                .map(|id| i32::try_from(id.saturating_sub(1)).unwrap_or(i32::MAX)),
            max_exclusive: self
                .end_id
                .and_then(|id| id.checked_add(1))
                .and_then(|id| i32::try_from(id).ok()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub reference: String,
    pub range: MessageRange,
}

impl ScrapeRequest {
    /// Build from command arguments: `<reference> [start_id] [end_id]`.
    ///
    /// Ids that are not plain digits are ignored, and so is `0`.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let reference = args
            .first()
            .map(|a| a.as_ref().trim())
            .filter(|a| !a.is_empty())
            .ok_or(Error::Usage)?;

        Ok(Self {
            reference: reference.to_string(),
            range: MessageRange {
                start_id: args.get(1).and_then(|a| parse_id(a.as_ref())),
                end_id: args.get(2).and_then(|a| parse_id(a.as_ref())),
            },
        })
    }
}

/// Plain digits only. Values past `i64` saturate instead of being dropped.
fn parse_id(arg: &str) -> Option<i64> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = arg.parse::<i64>().unwrap_or(i64::MAX);
    (id != 0).then_some(id)
}

/// Where the pipeline sends its progress and its result.
#[allow(async_fn_in_trait)]
pub trait Reporter {
    /// Replace the current status text.
    async fn update(&self, text: &str) -> Result<()>;

    /// Hand over the finished spreadsheet.
    async fn deliver(&self, file_name: &str, caption: &str, document: &ExportBuffer)
        -> Result<()>;

    /// Clear the status after a successful delivery.
    async fn finish(&self) -> Result<()>;
}

/// Terminal state of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Delivered { rows: usize },
    Empty,
    RateLimited { seconds: Option<u64> },
    Failed { message: String },
}

impl ScrapeOutcome {
    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            ScrapeOutcome::Delivered { .. } => "delivered",
            ScrapeOutcome::Empty => "empty",
            ScrapeOutcome::RateLimited { .. } => "rate_limited",
            ScrapeOutcome::Failed { .. } => "failed",
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            ScrapeOutcome::Delivered { rows } => *rows,
            _ => 0,
        }
    }
}

/// Records gathered for one chat.
#[derive(Debug, Clone)]
pub struct Collected {
    pub entity: Entity,
    pub records: Vec<MessageRecord>,
}

/// Join (for invites), resolve, and map every message in range.
pub async fn collect<S, R>(source: &S, request: &ScrapeRequest, reporter: &R) -> Result<Collected>
where
    S: MessageSource,
    R: Reporter,
{
    let reference = ChannelRef::parse(&request.reference)?;

    if let Some(hash) = reference.invite_hash() {
        match source.join_invite(hash).await {
            JoinOutcome::Joined => info!("Joined chat from invite link"),
            JoinOutcome::Failed(reason) => warn!(%reason, "Invite join failed, resolving anyway"),
        }
    }

    let (entity, target) = source.resolve(&reference).await?;
    info!(chat = %entity.title(), id = entity.id(), "Resolved chat");

    let mut messages = source.messages(&target, request.range.bounds());
    let mut records = Vec::new();
    while let Some(message) = messages.next().await? {
        records.push(map_message(&entity, &message));
        if records.len() % PROGRESS_EVERY == 0 {
            info!(processed = records.len(), "Scrape progress");
            if let Err(err) = reporter.update(&progress_text(records.len())).await {
                warn!("Failed to update progress: {}", err);
            }
        }
    }

    Ok(Collected { entity, records })
}

/// Collect, export and deliver. Errors are left to the caller.
pub async fn run<S, R>(source: &S, request: &ScrapeRequest, reporter: &R) -> Result<ScrapeOutcome>
where
    S: MessageSource,
    R: Reporter,
{
    let Collected { entity, records } = collect(source, request, reporter).await?;

    if records.is_empty() {
        reporter.update(NO_MESSAGES_TEXT).await?;
        info!(chat = %entity.title(), "No messages in range");
        return Ok(ScrapeOutcome::Empty);
    }

    let document = export(&records)?;
    let file_name = export_file_name(entity.title());
    let caption = export_caption(records.len(), entity.title());
    reporter.deliver(&file_name, &caption, &document).await?;

    if let Err(err) = reporter.finish().await {
        warn!("Failed to clear status message: {}", err);
    }

    info!(rows = records.len(), file = %file_name, bytes = document.len(), "Export delivered");
    Ok(ScrapeOutcome::Delivered {
        rows: records.len(),
    })
}

/// Run the pipeline and turn any failure into a reported terminal state.
pub async fn execute<S, R>(source: &S, request: &ScrapeRequest, reporter: &R) -> ScrapeOutcome
where
    S: MessageSource,
    R: Reporter,
{
    match run(source, request, reporter).await {
        Ok(outcome) => outcome,
        Err(err) => report_failure(reporter, &err).await,
    }
}

/// Text shown to the caller for a failed invocation.
pub fn failure_text(err: &Error) -> String {
    if err.is_rate_limited() {
        format!("Rate limited. Try later. ({})", err)
    } else {
        format!("Error: {}", err)
    }
}

pub async fn report_failure<R: Reporter>(reporter: &R, err: &Error) -> ScrapeOutcome {
    error!("Scrape failed: {}", err);
    if let Err(report_err) = reporter.update(&failure_text(err)).await {
        warn!("Failed to report scrape failure: {}", report_err);
    }

    match err {
        Error::RateLimited { seconds } => ScrapeOutcome::RateLimited { seconds: *seconds },
        other => ScrapeOutcome::Failed {
            message: other.to_string(),
        },
    }
}

/// Output format of the local `scrape` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Xlsx,
    /// One JSON object per line.
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(OutputFormat::Xlsx),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            other => Err(Error::ConfigError(format!(
                "Unknown output format '{}' (expected xlsx or json)",
                other
            ))),
        }
    }
}

/// Reports into the log and writes the delivered document into a directory.
pub struct FileReporter {
    dir: PathBuf,
}

impl FileReporter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn target(&self, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(file_name))
    }
}

impl Reporter for FileReporter {
    async fn update(&self, text: &str) -> Result<()> {
        info!("{}", text);
        Ok(())
    }

    async fn deliver(
        &self,
        file_name: &str,
        caption: &str,
        document: &ExportBuffer,
    ) -> Result<()> {
        let path = self.target(file_name)?;
        fs::write(&path, document.as_bytes())?;
        info!(path = %path.display(), "{}", caption);
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Local variant of the pipeline: results land in `dir`.
pub async fn run_to_dir<S: MessageSource>(
    source: &S,
    request: &ScrapeRequest,
    dir: &Path,
    format: OutputFormat,
) -> Result<ScrapeOutcome> {
    let reporter = FileReporter::new(dir);
    match format {
        OutputFormat::Xlsx => run(source, request, &reporter).await,
        OutputFormat::Json => {
            let Collected { entity, records } = collect(source, request, &reporter).await?;
            if records.is_empty() {
                reporter.update(NO_MESSAGES_TEXT).await?;
                return Ok(ScrapeOutcome::Empty);
            }

            let xlsx_name = export_file_name(entity.title());
            let stem = xlsx_name.strip_suffix(".xlsx").unwrap_or(&xlsx_name);
            let path = reporter.target(&format!("{}.jsonl", stem))?;
            write_json_lines(&path, &records)?;
            info!(path = %path.display(), rows = records.len(), "JSON export written");
            Ok(ScrapeOutcome::Delivered {
                rows: records.len(),
            })
        }
    }
}

fn write_json_lines(path: &Path, records: &[MessageRecord]) -> Result<()> {
    let mut out = std::io::BufWriter::new(fs::File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
