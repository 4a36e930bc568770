use doc2txt::scheduler::ADMISSION_POLL;
use doc2txt::{
    CancelFlag, ConversionResult, DegradedPolicy, ErrorKind, ExtractionError, Extractor,
    ProgressObserver, Registry, ResourceMonitor, Scheduler, Task, aggregate, render,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::Span;

struct Fixed(&'static str);

impl Extractor for Fixed {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn extract(&self, _input: &Path) -> Result<String, ExtractionError> {
        Ok(self.0.to_string())
    }
}

struct Failing(&'static str);

impl Extractor for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn extract(&self, _input: &Path) -> Result<String, ExtractionError> {
        Err(ExtractionError::failed(self.0))
    }
}

struct Panicking;

impl Extractor for Panicking {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn extract(&self, _input: &Path) -> Result<String, ExtractionError> {
        panic!("parser blew up");
    }
}

struct Fallback;

impl Extractor for Fallback {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn extract(&self, _input: &Path) -> Result<String, ExtractionError> {
        Err(ExtractionError::Degraded {
            text: "recovered text".into(),
            cause: "bad header".into(),
        })
    }
}

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Extractor for InFlight {
    fn name(&self) -> &'static str {
        "in-flight"
    }

    fn extract(&self, _input: &Path) -> Result<String, ExtractionError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(15));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok("busy".into())
    }
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Creates `input/<name>` and returns its task.
    fn task(&self, name: &str) -> Task {
        let input = self.dir.path().join("input").join(name);
        std::fs::create_dir_all(input.parent().unwrap()).unwrap();
        std::fs::write(&input, b"raw").unwrap();
        Task {
            input_path: input,
            output_path: self.output(name),
        }
    }

    fn output(&self, name: &str) -> PathBuf {
        self.dir
            .path()
            .join("output")
            .join(name)
            .with_extension("txt")
    }
}

fn find<'a>(results: &'a [ConversionResult], name: &str) -> &'a ConversionResult {
    results
        .iter()
        .find(|r| r.input_path.ends_with(name))
        .unwrap_or_else(|| panic!("no result for {name}"))
}

#[test]
fn mixed_batch_reports_each_outcome() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".pdf", Arc::new(Fixed("Hello"))).unwrap();
    reg.register(".docx", Arc::new(Failing("corrupt zip archive"))).unwrap();

    let tasks = vec![ws.task("a.pdf"), ws.task("b.xyz"), ws.task("c.docx")];
    let outcome = Scheduler::new(&reg, 4, Span::none()).run(tasks);
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.abandoned, 0);

    let a = find(&outcome.results, "a.pdf");
    assert!(a.success);
    assert_eq!(std::fs::read_to_string(ws.output("a.pdf")).unwrap(), "Hello");

    let b = find(&outcome.results, "b.xyz");
    assert!(!b.success);
    assert_eq!(b.error_kind, Some(ErrorKind::UnsupportedFormat));
    assert!(!ws.output("b.xyz").exists());

    let c = find(&outcome.results, "c.docx");
    assert!(!c.success);
    assert_eq!(c.error_kind, Some(ErrorKind::Extraction));
    assert!(c.error.as_deref().unwrap().contains("corrupt zip archive"));

    let report = aggregate(outcome.results);
    assert_eq!(report.successful.len(), 1);
    assert_eq!(report.failed.len(), 2);
    assert!(render(&report).contains("Success rate: 33.3%"));
}

#[test]
fn one_result_per_task_despite_failures_and_panics() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("fine"))).unwrap();
    reg.register(".bad", Arc::new(Failing("nope"))).unwrap();
    reg.register(".boom", Arc::new(Panicking)).unwrap();

    let mut tasks = Vec::new();
    for i in 0..30 {
        let ext = ["md", "bad", "boom", "unknown"][i % 4];
        tasks.push(ws.task(&format!("doc{i}.{ext}")));
    }

    let outcome = Scheduler::new(&reg, 3, Span::none()).run(tasks.clone());
    assert_eq!(outcome.results.len(), tasks.len());

    let mut seen: Vec<_> = outcome.results.iter().map(|r| r.input_path.clone()).collect();
    seen.sort();
    let mut expected: Vec<_> = tasks.iter().map(|t| t.input_path.clone()).collect();
    expected.sort();
    assert_eq!(seen, expected);

    for r in &outcome.results {
        let ext = r.input_path.extension().unwrap().to_str().unwrap();
        match ext {
            "md" => assert!(r.success, "{r:?}"),
            "bad" => assert_eq!(r.error_kind, Some(ErrorKind::Extraction)),
            "boom" => {
                assert_eq!(r.error_kind, Some(ErrorKind::Panicked));
                assert!(r.error.as_deref().unwrap().contains("parser blew up"));
            }
            _ => assert_eq!(r.error_kind, Some(ErrorKind::UnsupportedFormat)),
        }
    }
}

#[test]
fn concurrency_above_cap_is_clamped() {
    let ws = Workspace::new();
    let counter = Arc::new(InFlight::default());
    let mut reg = Registry::new();
    reg.register(".pdf", counter.clone()).unwrap();

    let tasks: Vec<_> = (0..40).map(|i| ws.task(&format!("{i:02}.pdf"))).collect();
    let scheduler = Scheduler::new(&reg, 25, Span::none());
    assert_eq!(scheduler.concurrency(), 10);

    let outcome = scheduler.run(tasks);
    assert_eq!(outcome.results.len(), 40);
    assert!(outcome.results.iter().all(|r| r.success));
    let peak = counter.peak.load(Ordering::SeqCst);
    assert!((1..=10).contains(&peak), "peak in-flight was {peak}");
}

#[test]
fn zero_concurrency_still_makes_progress() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("x"))).unwrap();

    let scheduler = Scheduler::new(&reg, 0, Span::none());
    assert_eq!(scheduler.concurrency(), 1);
    let outcome = scheduler.run(vec![ws.task("a.md"), ws.task("b.md")]);
    assert_eq!(outcome.results.len(), 2);
}

#[test]
fn empty_batch_yields_no_results() {
    let reg = Registry::new();
    let outcome = Scheduler::new(&reg, 4, Span::none()).run(Vec::new());
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.abandoned, 0);
}

#[test]
fn degraded_text_follows_policy() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".mobi", Arc::new(Fallback)).unwrap();

    let rejected = Scheduler::new(&reg, 1, Span::none()).run(vec![ws.task("book.mobi")]);
    let r = &rejected.results[0];
    assert!(!r.success);
    assert_eq!(r.error_kind, Some(ErrorKind::Degraded));
    assert!(!ws.output("book.mobi").exists());

    let accepted = Scheduler::new(&reg, 1, Span::none())
        .with_degraded_policy(DegradedPolicy::Accept)
        .run(vec![ws.task("book.mobi")]);
    let r = &accepted.results[0];
    assert!(r.success);
    assert!(r.degraded);
    assert_eq!(
        std::fs::read_to_string(ws.output("book.mobi")).unwrap(),
        "recovered text"
    );
}

#[test]
fn empty_extraction_is_a_failure() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("  \n\t "))).unwrap();

    let outcome = Scheduler::new(&reg, 1, Span::none()).run(vec![ws.task("blank.md")]);
    let r = &outcome.results[0];
    assert!(!r.success);
    assert_eq!(r.error_kind, Some(ErrorKind::Extraction));
    assert!(!ws.output("blank.md").exists());
}

#[test]
fn text_that_normalizes_to_nothing_is_a_failure() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("\u{0}\u{1}\u{7}"))).unwrap();

    let outcome = Scheduler::new(&reg, 1, Span::none()).run(vec![ws.task("noise.md")]);
    let r = &outcome.results[0];
    assert!(!r.success);
    assert_eq!(r.error_kind, Some(ErrorKind::Extraction));
    assert!(r.error.as_deref().unwrap().contains("no text could be extracted"));
    assert!(!ws.output("noise.md").exists());
}

#[test]
fn admission_control_delays_but_never_drops_tasks() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("x"))).unwrap();

    // A one-byte ceiling is always exceeded by the running process.
    let monitor = ResourceMonitor::new(1, Span::none());
    let tasks: Vec<_> = (0..3).map(|i| ws.task(&format!("{i}.md"))).collect();

    let started = Instant::now();
    let outcome = Scheduler::new(&reg, 2, Span::none())
        .with_admission_control(&monitor)
        .with_admission_timeout(Duration::from_millis(150))
        .run(tasks);

    assert!(started.elapsed() >= ADMISSION_POLL);
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.abandoned, 0);
    assert!(outcome.results.iter().all(|r| r.success));
}

#[test]
fn admission_control_is_free_under_the_ceiling() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("x"))).unwrap();

    let monitor = ResourceMonitor::new(u64::MAX, Span::none());
    let outcome = Scheduler::new(&reg, 2, Span::none())
        .with_admission_control(&monitor)
        .run(vec![ws.task("a.md"), ws.task("b.md")]);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.iter().all(|r| r.success));
}

#[test]
fn missing_input_and_unwritable_output_are_failures() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("text"))).unwrap();

    let missing = Task {
        input_path: ws.dir.path().join("input/gone.md"),
        output_path: ws.output("gone.md"),
    };

    // A regular file where the output directory should be.
    let blocker = ws.dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let mut unwritable = ws.task("ok.md");
    unwritable.output_path = blocker.join("ok.txt");

    let outcome = Scheduler::new(&reg, 2, Span::none()).run(vec![missing, unwritable]);
    assert_eq!(outcome.results.len(), 2);

    let gone = find(&outcome.results, "gone.md");
    assert_eq!(gone.error_kind, Some(ErrorKind::Extraction));
    assert!(gone.error.as_deref().unwrap().contains("does not exist"));

    let ok = find(&outcome.results, "ok.md");
    assert_eq!(ok.error_kind, Some(ErrorKind::OutputWrite));
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(usize, usize)>>,
}

impl ProgressObserver for Recorder {
    fn on_result(&self, _result: &ConversionResult, completed: usize, total: usize) {
        self.seen.lock().unwrap().push((completed, total));
    }
}

#[test]
fn observer_sees_every_result() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("x"))).unwrap();

    let recorder = Recorder::default();
    let tasks: Vec<_> = (0..5).map(|i| ws.task(&format!("{i}.md"))).collect();
    let outcome = Scheduler::new(&reg, 2, Span::none())
        .with_observer(&recorder)
        .run(tasks);

    assert_eq!(outcome.results.len(), 5);
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(*seen, (1..=5).map(|i| (i, 5)).collect::<Vec<_>>());
}

#[test]
fn cancelled_before_start_abandons_everything() {
    let ws = Workspace::new();
    let mut reg = Registry::new();
    reg.register(".md", Arc::new(Fixed("x"))).unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let tasks: Vec<_> = (0..4).map(|i| ws.task(&format!("{i}.md"))).collect();
    let outcome = Scheduler::new(&reg, 2, Span::none())
        .with_cancel_flag(cancel)
        .run(tasks);

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.abandoned, 4);
}

struct CancelAfterFirst(CancelFlag);

impl ProgressObserver for CancelAfterFirst {
    fn on_result(&self, _result: &ConversionResult, _completed: usize, _total: usize) {
        self.0.cancel();
    }
}

#[test]
fn cancelling_mid_run_keeps_completed_results() {
    let ws = Workspace::new();
    let counter = Arc::new(InFlight::default());
    let mut reg = Registry::new();
    reg.register(".pdf", counter).unwrap();

    let cancel = CancelFlag::new();
    let observer = CancelAfterFirst(cancel.clone());
    let tasks: Vec<_> = (0..20).map(|i| ws.task(&format!("{i:02}.pdf"))).collect();
    let outcome = Scheduler::new(&reg, 1, Span::none())
        .with_cancel_flag(cancel)
        .with_observer(&observer)
        .run(tasks);

    assert!(!outcome.results.is_empty());
    assert!(outcome.abandoned > 0);
    assert_eq!(outcome.results.len() + outcome.abandoned, 20);
    assert!(outcome.results.iter().all(|r| r.success));
}
