//! CLI binary for handwriting-client.
//!
//! A thin shim over the library crate that maps CLI flags to `ClientConfig`
//! and `RenderConfig`, drives a `JobController`, and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use handwriting_client::{
    ClientConfig, ExportFormat, Gateway, HandwritingStyle, HttpGateway, InkColor, JobController,
    JobObserver, JobSnapshot, PaperType, ProcessingStatus, RenderConfig, RenderConfigPatch,
    SharedObserver,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner while uploading, then a 0–100 % bar that
/// follows the backend's progress and stage label.
struct CliObserver {
    bar: ProgressBar,
    started: Instant,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }

    /// Switch to the percentage bar once the backend has accepted the job.
    fn activate_bar(&self) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_elapsed();
    }
}

impl JobObserver for CliObserver {
    fn on_notice(&self, message: &str) {
        self.bar.println(format!("  {} {}", red("✗"), red(message)));
    }

    fn on_upload_start(&self, filename: &str, size: u64) {
        self.bar.set_prefix("Uploading");
        self.bar.set_message(format!(
            "{filename} {}",
            dim(&format!("({:.1} MB)", size as f64 / 1_048_576.0))
        ));
    }

    fn on_upload_complete(&self, job_id: &str, pages: u32) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("Uploaded {pages} pages")),
            dim(&format!("job {job_id}"))
        ));
        self.bar.set_prefix("Starting");
        self.bar.set_message("");
    }

    fn on_upload_error(&self, error: &str) {
        self.bar.println(format!("  {} Upload failed: {}", red("✗"), red(error)));
    }

    fn on_processing_start(&self, _job_id: &str) {
        self.activate_bar();
    }

    fn on_progress(&self, snapshot: &JobSnapshot) {
        self.bar.set_position(u64::from(snapshot.progress));
        self.bar.set_message(snapshot.current_stage.clone());
    }

    fn on_completed(&self, _job_id: &str, num_pages: u32) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages rendered  {}",
            green("✔"),
            bold(&num_pages.to_string()),
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
        );
    }

    fn on_failed(&self, _job_id: &str, error: &str) {
        self.bar.abandon();
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 120 {
            let cut: String = error.chars().take(119).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        eprintln!("{} Rendering failed: {}", red("✘"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert with defaults (Caveat on lined paper), save handwritten_notes.pdf
  handwrite convert notes.pdf

  # Pick a style and paper, export PNG
  handwrite convert notes.pdf --style indie-flower --paper graph --format png

  # Messier handwriting in blue ink, retry once if the render fails
  handwrite convert notes.pdf --imperfection 0.15 --ink blue --retries 1

  # Render a failed job again with different settings (the backend refuses
  # jobs that already completed; upload the PDF again for those)
  handwrite regenerate 3f1c… --style homemade-apple --paper blank

  # Check on a job, then fetch page 2 as an image
  handwrite status 3f1c…
  handwrite preview 3f1c… --page 2 -o page2.png

  # List and clean up jobs on the server
  handwrite jobs
  handwrite delete 3f1c… --yes

ENVIRONMENT VARIABLES:
  HANDWRITE_API_URL       Backend base URL (default http://localhost:8000)
  HANDWRITE_TIMEOUT       Request timeout in seconds
  HANDWRITE_POLL_MS       Status poll interval in milliseconds
  RUST_LOG                Override log filter (e.g. handwriting_client=debug)
"#;

/// Turn typed PDFs into handwritten notes via the rendering service.
#[derive(Parser, Debug)]
#[command(
    name = "handwrite",
    version,
    about = "Turn typed PDFs into handwritten notes via the rendering service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Backend base URL (without /api/v1).
    #[arg(long, global = true, env = "HANDWRITE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Timeout for status/start/list calls, in seconds.
    #[arg(long, global = true, env = "HANDWRITE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Timeout for uploads and downloads, in seconds.
    #[arg(long, global = true, env = "HANDWRITE_TRANSFER_TIMEOUT", default_value_t = 300)]
    transfer_timeout: u64,

    /// Status poll interval in milliseconds.
    #[arg(long, global = true, env = "HANDWRITE_POLL_MS", default_value_t = 1000)]
    poll_ms: u64,

    /// Disable progress bar.
    #[arg(long, global = true, env = "HANDWRITE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "HANDWRITE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "HANDWRITE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF, render it, and download the result.
    Convert(ConvertArgs),
    /// Render an uploaded job again with new settings (failed jobs only on
    /// backends that refuse completed ones).
    Regenerate(RegenerateArgs),
    /// Print the backend status of a job.
    Status {
        job_id: String,
        /// Print raw JSON.
        #[arg(long)]
        json: bool,
    },
    /// Download the result of a completed job.
    Download {
        job_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "pdf")]
        format: FormatArg,
    },
    /// Save the preview image of one rendered page.
    Preview {
        job_id: String,
        /// 1-indexed page number.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print download and preview URLs without contacting the backend.
    Urls {
        job_id: String,
        /// Number of preview pages to list.
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// List recent jobs on the backend.
    Jobs {
        #[arg(long)]
        json: bool,
    },
    /// Delete a job and its files on the backend.
    Delete {
        job_id: String,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF to convert (≤ 50 MB).
    input: PathBuf,

    #[command(flatten)]
    render: RenderArgs,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct RegenerateArgs {
    /// Job id of a previously uploaded PDF.
    job_id: String,

    #[command(flatten)]
    render: RenderArgs,

    #[command(flatten)]
    out: OutputArgs,
}

/// Rendering settings sent with the process request.
#[derive(Args, Debug)]
struct RenderArgs {
    /// Handwriting font.
    #[arg(long, value_enum, default_value = "caveat")]
    style: StyleArg,

    /// Paper texture.
    #[arg(long, value_enum, default_value = "lined")]
    paper: PaperArg,

    /// Ink colour.
    #[arg(long, value_enum, default_value = "midnight")]
    ink: InkArg,

    /// Handwriting imperfection (0.0–0.2).
    #[arg(long, default_value_t = 0.07, value_parser = parse_imperfection)]
    imperfection: f32,

    /// Ruled-line spacing in pixels (20–40).
    #[arg(long, default_value_t = 28, value_parser = clap::value_parser!(u32).range(20..=40))]
    line_spacing: u32,

    /// Font size in points (12–32).
    #[arg(long, default_value_t = 18, value_parser = clap::value_parser!(u32).range(12..=32))]
    font_size: u32,

    /// Disable ink smudges.
    #[arg(long)]
    no_smudges: bool,

    /// Add coffee stains.
    #[arg(long)]
    coffee_stains: bool,

    /// Disable page shadows.
    #[arg(long)]
    no_shadows: bool,

    /// Add margin annotations.
    #[arg(long)]
    annotations: bool,
}

impl RenderArgs {
    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            handwriting_style: self.style.into(),
            paper_type: self.paper.into(),
            imperfection_level: self.imperfection,
            ink_color: self.ink.into(),
            line_spacing: self.line_spacing,
            font_size: self.font_size,
            enable_smudges: !self.no_smudges,
            enable_coffee_stains: self.coffee_stains,
            enable_page_shadows: !self.no_shadows,
            enable_annotations: self.annotations,
        }
    }
}

/// What to do once the job has finished.
#[derive(Args, Debug)]
struct OutputArgs {
    /// Write the result here instead of handwritten_<name>.<format>.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Result format.
    #[arg(long, value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Regenerate a failed render up to N times with the same settings.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Render only; do not download the result.
    #[arg(long)]
    no_download: bool,

    /// Print the final job state as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_imperfection(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if !(0.0..=0.2).contains(&v) {
        return Err(format!("imperfection must be 0.0–0.2, got {v}"));
    }
    Ok(v)
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Png,
    Jpg,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Jpg => ExportFormat::Jpg,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StyleArg {
    Caveat,
    IndieFlower,
    PermanentMarker,
    ShadowsIntoLight,
    PatrickHand,
    ReenieBeanie,
    CoveredByYourGrace,
    HomemadeApple,
}

impl From<StyleArg> for HandwritingStyle {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Caveat => HandwritingStyle::Caveat,
            StyleArg::IndieFlower => HandwritingStyle::IndieFlower,
            StyleArg::PermanentMarker => HandwritingStyle::PermanentMarker,
            StyleArg::ShadowsIntoLight => HandwritingStyle::ShadowsIntoLight,
            StyleArg::PatrickHand => HandwritingStyle::PatrickHand,
            StyleArg::ReenieBeanie => HandwritingStyle::ReenieBeanie,
            StyleArg::CoveredByYourGrace => HandwritingStyle::CoveredByYourGrace,
            StyleArg::HomemadeApple => HandwritingStyle::HomemadeApple,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PaperArg {
    Lined,
    Graph,
    Blank,
    Engineering,
}

impl From<PaperArg> for PaperType {
    fn from(v: PaperArg) -> Self {
        match v {
            PaperArg::Lined => PaperType::Lined,
            PaperArg::Graph => PaperType::Graph,
            PaperArg::Blank => PaperType::Blank,
            PaperArg::Engineering => PaperType::Engineering,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum InkArg {
    Midnight,
    Black,
    Blue,
    Red,
    Green,
    Purple,
}

impl From<InkArg> for InkColor {
    fn from(v: InkArg) -> Self {
        match v {
            InkArg::Midnight => InkColor::Midnight,
            InkArg::Black => InkColor::Black,
            InkArg::Blue => InkColor::Blue,
            InkArg::Red => InkColor::Red,
            InkArg::Green => InkColor::Green,
            InkArg::Purple => InkColor::Purple,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !g.quiet && !g.no_progress;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ClientConfig::builder()
        .base_url(&g.api_url)
        .request_timeout_secs(g.timeout)
        .transfer_timeout_secs(g.transfer_timeout)
        .poll_interval_ms(g.poll_ms)
        .build()
        .context("Invalid configuration")?;
    let gateway = Arc::new(HttpGateway::new(&config).context("Failed to create HTTP client")?);

    match &cli.command {
        Command::Convert(args) => {
            let controller = new_controller(gateway.clone(), &config, show_progress);
            controller
                .select_file(&args.input)
                .await
                .context("Upload failed")?;
            let fallback = default_output_path(&args.input, args.out.format.into());
            run_job(&controller, &args.render, &args.out, fallback, g, &gateway).await
        }
        Command::Regenerate(args) => {
            let controller = new_controller(gateway.clone(), &config, show_progress);
            controller.attach(&args.job_id).await;
            let format = ExportFormat::from(args.out.format);
            let fallback =
                PathBuf::from(format!("handwritten_{}.{}", args.job_id, format.as_str()));
            run_job(&controller, &args.render, &args.out, fallback, g, &gateway).await
        }
        Command::Status { job_id, json } => {
            let status = gateway
                .get_status(job_id)
                .await
                .context("Status request failed")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Job:          {}", status.job_id);
                println!("Status:       {}", status.status);
                println!("Progress:     {}%", status.progress);
                println!("Stage:        {}", status.current_stage);
                println!("Pages:        {}", status.num_pages);
                if let Some(ref e) = status.error_message {
                    println!("Error:        {}", e);
                }
            }
            Ok(())
        }
        Command::Download {
            job_id,
            output,
            format,
        } => {
            let format = ExportFormat::from(*format);
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("handwritten_{job_id}.{}", format.as_str())));
            let bytes = gateway
                .download_to(job_id, format, &path)
                .await
                .context("Download failed")?;
            if !g.quiet {
                eprintln!("{}  {} bytes  →  {}", green("✔"), bytes, bold(&path.display().to_string()));
            }
            Ok(())
        }
        Command::Preview {
            job_id,
            page,
            output,
        } => {
            let (img, bytes) = gateway
                .preview_image(job_id, *page)
                .await
                .context("Preview request failed")?;
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("preview_{job_id}_p{page}.png")));
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !g.quiet {
                eprintln!(
                    "{}  page {}  {}×{} px  →  {}",
                    green("✔"),
                    page,
                    img.width(),
                    img.height(),
                    bold(&path.display().to_string())
                );
            }
            Ok(())
        }
        Command::Urls { job_id, pages } => {
            for format in [ExportFormat::Pdf, ExportFormat::Png, ExportFormat::Jpg] {
                println!("download {:<4} {}", format.as_str(), gateway.download_url(job_id, format));
            }
            for page in 1..=(*pages).max(1) {
                println!("preview  p{:<3} {}", page, gateway.preview_url(job_id, page));
            }
            Ok(())
        }
        Command::Jobs { json } => {
            let list = gateway.list_jobs().await.context("Listing jobs failed")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if list.jobs.is_empty() {
                println!("No jobs.");
            } else {
                println!("{:<36}  {:<10}  {:>4}  {:>5}  FILE", "ID", "STATUS", "PCT", "PAGES");
                for job in &list.jobs {
                    println!(
                        "{:<36}  {:<10}  {:>3}%  {:>5}  {}",
                        job.id, job.status, job.progress, job.num_pages, job.filename
                    );
                }
            }
            Ok(())
        }
        Command::Delete { job_id, yes } => {
            if !*yes && !confirm(&format!("Delete job {job_id} and its files?"))? {
                eprintln!("Aborted.");
                return Ok(());
            }
            gateway.delete_job(job_id).await.context("Delete failed")?;
            if !g.quiet {
                eprintln!("{} Deleted {}", green("✔"), job_id);
            }
            Ok(())
        }
    }
}

fn new_controller(
    gateway: Arc<HttpGateway>,
    config: &ClientConfig,
    show_progress: bool,
) -> JobController {
    let controller = JobController::new(gateway, config);
    if show_progress {
        controller.with_observer(CliObserver::new() as SharedObserver)
    } else {
        controller
    }
}

/// Configure, start, and follow the job the controller holds, then save
/// the result. Failed renders are regenerated up to `--retries` times.
async fn run_job(
    controller: &JobController,
    render: &RenderArgs,
    out: &OutputArgs,
    fallback_path: PathBuf,
    g: &GlobalArgs,
    gateway: &HttpGateway,
) -> Result<()> {
    let start = Instant::now();
    controller
        .update_config(RenderConfigPatch::from(render.render_config()))
        .await;

    controller.convert().await.context("Failed to start rendering")?;
    let mut job = controller.wait().await.context("Polling stopped")?;

    let mut attempt = 0;
    while job.processing_status == ProcessingStatus::Failed && attempt < out.retries {
        attempt += 1;
        if !g.quiet {
            eprintln!("{} Regenerating (attempt {}/{})", cyan("↻"), attempt, out.retries);
        }
        controller
            .regenerate()
            .await
            .context("Failed to restart rendering")?;
        job = controller.wait().await.context("Polling stopped")?;
    }

    if out.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    }

    let job = job.into_result().context("Conversion failed")?;
    let job_id = job
        .job_id
        .clone()
        .context("Backend did not return a job id")?;

    if out.no_download {
        if !g.quiet && !out.json {
            println!("{job_id}");
        }
        return Ok(());
    }

    let format = ExportFormat::from(out.format);
    let path = out.output.clone().unwrap_or(fallback_path);
    let bytes = gateway
        .download_to(&job_id, format, &path)
        .await
        .context("Download failed")?;

    if !g.quiet {
        eprintln!(
            "{}  {} pages  {} bytes  {}ms  →  {}",
            green("✔"),
            job.num_pages(),
            bytes,
            start.elapsed().as_millis(),
            bold(&path.display().to_string()),
        );
        eprintln!("   {}", dim(&format!("job {job_id}")));
    }
    Ok(())
}

/// `handwritten_<stem>.<ext>` next to the input file, matching the name the
/// backend suggests for downloads.
fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("handwritten_{stem}.{}", format.as_str()))
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
