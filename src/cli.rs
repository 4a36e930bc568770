use crate::{
    config::{Config, RunConfig},
    monitor::ResourceMonitor,
    pipeline::{Pipeline, RunOutcome},
    registry::Registry,
    report::RunReport,
    scheduler::{ConversionResult, ProgressObserver},
    util::{config_fingerprint, ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Span, info, info_span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Parser, Debug)]
#[command(name = "doc2txt")]
#[command(about = "Convert a folder of documents (PDF, Office, HTML, Markdown, e-books) to plain text")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Path to config TOML. If omitted, uses ./doc2txt.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert every supported document under the input folder.
    Run(RunArgs),
    /// List supported file extensions.
    Formats {
        #[arg(long)]
        json: bool,
    },
    /// Print a memory status snapshot.
    Status {},
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Input folder containing documents.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output folder for text files.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of documents converted in parallel (max 10).
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Memory ceiling in GB.
    #[arg(short, long)]
    pub max_memory: Option<f64>,

    /// Flatten output instead of keeping page/sheet/slide markers.
    #[arg(long)]
    pub no_structure: bool,

    /// Overwrite existing output files.
    #[arg(long)]
    pub overwrite: bool,
}

impl RunArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(input) = &self.input {
            cfg.run.input_folder = input.display().to_string();
        }
        if let Some(output) = &self.output {
            cfg.run.output_folder = output.display().to_string();
        }
        if let Some(n) = self.batch_size {
            cfg.run.batch_size = n;
        }
        if let Some(gb) = self.max_memory {
            cfg.run.max_memory_gb = gb;
        }
        if self.no_structure {
            cfg.run.preserve_structure = false;
        }
        if self.overwrite {
            cfg.run.overwrite_existing = true;
        }
    }
}

/// Runs the selected command and returns the process exit code.
pub fn dispatch(args: Args) -> Result<i32> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    // An explicit --config must exist; the implicit defaults may be absent.
    let mut cfg = if args.config.is_some() {
        Config::load(&cfg_path)?
    } else {
        Config::load_or_default(&cfg_path)?
    };

    match args.cmd.as_ref() {
        None => run(&args, &mut cfg, &RunArgs::default()),
        Some(Command::Run(run_args)) => run(&args, &mut cfg, run_args),
        Some(Command::Formats { json }) => {
            formats(&cfg, *json)?;
            Ok(0)
        }
        Some(Command::Status {}) => {
            let _guard = init_logging(&args, &cfg, None)?;
            status(&cfg)?;
            Ok(0)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> PathBuf {
    if let Some(p) = user {
        return p.to_path_buf();
    }
    let default = PathBuf::from("doc2txt.toml");
    if default.exists() {
        default
    } else {
        PathBuf::from("doc2txt.example.toml")
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = console_level(args.log_level.as_deref(), &cfg.logging.console_level)?;

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(console)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(console)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

/// Console verbosity. A plain `--log-level` value also raises the console;
/// filter directives such as `info,doc2txt=debug` only reach the global filter.
fn console_level(cli_level: Option<&str>, configured: &str) -> Result<LevelFilter> {
    if let Some(level) = cli_level.and_then(|l| l.parse::<LevelFilter>().ok()) {
        return Ok(level);
    }
    configured
        .parse()
        .map_err(|e| anyhow!("invalid logging.console_level '{configured}': {e}"))
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file || cfg.logging.file_path.is_empty() {
        return None;
    }
    Some(PathBuf::from(&cfg.logging.file_path))
}

fn run(args: &Args, cfg: &mut Config, run_args: &RunArgs) -> Result<i32> {
    run_args.apply(cfg);

    let log_path = resolve_log_path(cfg);
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    let run_cfg = cfg.run_config().context("invalid [run] configuration")?;
    let cfg_hash = config_fingerprint(cfg);

    print_banner(&run_cfg);
    info!("config sha256={cfg_hash}");

    let span = info_span!("batch", config = %&cfg_hash[..12]);
    let registry = Registry::builtin(run_cfg.preserve_structure);
    let pipeline = Pipeline::new(&run_cfg, registry, span);

    let started = now_rfc3339();
    let bar = cfg.output.show_progress.then(BarObserver::new);
    let outcome = pipeline
        .run(bar.as_ref().map(|b| b as &dyn ProgressObserver), None)
        .with_context(|| format!("scanning {}", run_cfg.input_folder.display()))?;
    if let Some(bar) = &bar {
        bar.finish();
    }

    if cfg.output.print_report {
        println!("{}", outcome.rendered);
    }
    info!("{}", outcome.rendered);

    if cfg.output.write_report_json {
        let path = run_cfg.output_folder.join(&cfg.output.report_filename);
        run_report(&run_cfg, &outcome, cfg_hash, started).write(&path)?;
        info!("report written to {}", path.display());
    }

    Ok(if outcome.exit_ok(run_cfg.skip_on_error) {
        0
    } else {
        1
    })
}

fn run_report(cfg: &RunConfig, outcome: &RunOutcome, cfg_hash: String, started: String) -> RunReport {
    let report = &outcome.report;
    RunReport {
        config_sha256: cfg_hash,
        started,
        finished: now_rfc3339(),
        input_folder: cfg.input_folder.display().to_string(),
        output_folder: cfg.output_folder.display().to_string(),
        concurrency: cfg.concurrency,
        memory_before: outcome.memory_before,
        memory_after: outcome.memory_after,
        total: report.total(),
        successful: report.successful.len(),
        failed: report.failed.len(),
        abandoned: outcome.abandoned,
        success_rate: report.success_rate(),
        results: report
            .successful
            .iter()
            .chain(report.failed.iter())
            .cloned()
            .collect(),
    }
}

fn print_banner(cfg: &RunConfig) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("DOCUMENT TO TEXT CONVERTER");
    println!("{rule}");
    println!("Input folder:  {}", cfg.input_folder.display());
    println!("Output folder: {}", cfg.output_folder.display());
    println!("Batch size:    {}", cfg.concurrency);
    println!("Max memory:    {}", crate::util::format_gb(cfg.memory_ceiling_bytes));
    println!("Preserve structure: {}", cfg.preserve_structure);
    println!("{rule}\n");
}

fn formats(cfg: &Config, json: bool) -> Result<()> {
    let registry = Registry::builtin(cfg.run.preserve_structure);
    let mut grouped: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    for ext in registry.supported_extensions() {
        grouped.entry(format_category(&ext)).or_default().push(ext);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&grouped)?);
        return Ok(());
    }

    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("SUPPORTED FILE FORMATS");
    println!("{rule}");
    for (category, exts) in &grouped {
        println!("\n{category}:");
        for ext in exts {
            println!("  • {ext}");
        }
    }
    println!("\n{rule}\n");
    Ok(())
}

fn format_category(ext: &str) -> &'static str {
    match ext {
        ".pdf" => "PDF Documents",
        ".docx" | ".xlsx" | ".pptx" => "Microsoft Office",
        ".html" | ".htm" => "Web Documents",
        ".md" | ".markdown" => "Markdown",
        ".epub" | ".mobi" => "E-books",
        ".srt" | ".vtt" => "Subtitles",
        _ => "Other",
    }
}

fn status(cfg: &Config) -> Result<()> {
    let run_cfg = cfg.run_config()?;
    let monitor = ResourceMonitor::new(run_cfg.memory_ceiling_bytes, Span::current());
    let snapshot = monitor.status_snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "memory": snapshot,
            "ceiling_bytes": monitor.ceiling_bytes(),
            "within_ceiling": monitor.available(0),
        }))?
    );
    Ok(())
}

/// Progress bar fed from the scheduler's result stream.
struct BarObserver {
    bar: ProgressBar,
    ok: AtomicUsize,
    failed: AtomicUsize,
}

impl BarObserver {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        Self {
            bar,
            ok: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for BarObserver {
    fn on_result(&self, result: &ConversionResult, completed: usize, total: usize) {
        let counter = if result.success { &self.ok } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
        self.bar.set_message(format!(
            "ok {} failed {}",
            self.ok.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        ));
    }
}
