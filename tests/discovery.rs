use doc2txt::{Discovery, DiscoveryError, Extractor, ExtractionError, Registry};
use std::path::Path;
use std::sync::Arc;
use tracing::Span;

struct Noop;

impl Extractor for Noop {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn extract(&self, _input: &Path) -> Result<String, ExtractionError> {
        Ok("text".into())
    }
}

fn registry() -> Registry {
    let mut reg = Registry::new();
    reg.register(".pdf", Arc::new(Noop)).unwrap();
    reg.register(".docx", Arc::new(Noop)).unwrap();
    reg.register(".md", Arc::new(Noop)).unwrap();
    reg
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"x").unwrap();
}

#[test]
fn mirrors_tree_and_ignores_unsupported() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("b.pdf"));
    touch(&input.path().join("nested/deeper/a.MD"));
    touch(&input.path().join("notes.xyz"));
    touch(&input.path().join("README"));

    let reg = registry();
    let tasks = Discovery::new(&reg, Span::none())
        .discover(input.path(), output.path(), false)
        .unwrap();

    assert_eq!(tasks.len(), 2);
    assert!(tasks.windows(2).all(|w| w[0].input_path <= w[1].input_path));

    let md = tasks
        .iter()
        .find(|t| t.input_path.ends_with("a.MD"))
        .unwrap();
    assert_eq!(md.output_path, output.path().join("nested/deeper/a.txt"));
    let pdf = tasks
        .iter()
        .find(|t| t.input_path.ends_with("b.pdf"))
        .unwrap();
    assert_eq!(pdf.output_path, output.path().join("b.txt"));
}

#[test]
fn existing_outputs_are_skipped_unless_overwriting() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("a.pdf"));
    touch(&input.path().join("b.pdf"));
    touch(&output.path().join("a.txt"));

    let reg = registry();
    let discovery = Discovery::new(&reg, Span::none());

    let tasks = discovery.discover(input.path(), output.path(), false).unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].input_path.ends_with("b.pdf"));

    let tasks = discovery.discover(input.path(), output.path(), true).unwrap();
    assert_eq!(tasks.len(), 2);
}

#[test]
fn second_pass_after_all_outputs_exist_is_empty() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("a.pdf"));
    touch(&input.path().join("a.docx"));
    touch(&input.path().join("sub/c.md"));

    let reg = registry();
    let discovery = Discovery::new(&reg, Span::none());

    let first = discovery.discover(input.path(), output.path(), false).unwrap();
    assert_eq!(first.len(), 3);
    for task in &first {
        touch(&task.output_path);
    }

    let second = discovery.discover(input.path(), output.path(), false).unwrap();
    assert!(second.is_empty(), "unexpected tasks: {second:?}");
}

#[test]
fn colliding_outputs_get_distinct_paths() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("a.pdf"));
    touch(&input.path().join("a.docx"));

    let reg = registry();
    let tasks = Discovery::new(&reg, Span::none())
        .discover(input.path(), output.path(), false)
        .unwrap();

    assert_eq!(tasks.len(), 2);
    assert_ne!(tasks[0].output_path, tasks[1].output_path);
    // Walk order is by file name, so `a.docx` claims `a.txt` first.
    let pdf = tasks
        .iter()
        .find(|t| t.input_path.ends_with("a.pdf"))
        .unwrap();
    assert_eq!(pdf.output_path, output.path().join("a.pdf.txt"));
}

#[test]
fn custom_output_extension() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("a.pdf"));

    let reg = registry();
    let tasks = Discovery::new(&reg, Span::none())
        .with_output_extension(".text")
        .discover(input.path(), output.path(), false)
        .unwrap();
    assert_eq!(tasks[0].output_path, output.path().join("a.text"));
}

#[test]
fn missing_root_is_an_error() {
    let base = tempfile::tempdir().unwrap();
    let reg = registry();
    let err = Discovery::new(&reg, Span::none())
        .discover(&base.path().join("nope"), base.path(), false)
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::InputRootMissing { .. }));
    assert!(err.to_string().starts_with("input root missing"));
}
