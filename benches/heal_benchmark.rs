use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use doc_guardian::detector::similarity;
use doc_guardian::{
    Config, ConfidenceFactors, DetectorRegistry, Orchestrator, OrchestratorOptions, ShutdownFlag,
    ThresholdPolicy,
};

fn create_doc(dir: &Path, name: &str, content: &str) {
    let path = dir.join("docs").join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// `count` pages, each with one broken link and one typo.
fn setup_docs(count: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..count {
        create_doc(temp_dir.path(), &format!("api/endpoint_{i}.md"), "# Endpoint\n");
        let content = format!(
            "# Page {i}\n\nSee [the endpoint](api/endpoint_{i}_old.md).\n\
             Clients recieve a token.\n\n```\nteh code block\n```\n"
        );
        create_doc(temp_dir.path(), &format!("page_{i}.md"), &content);
    }
    temp_dir
}

fn orchestrator(root: &Path) -> Orchestrator {
    Orchestrator::new(
        Config::default(),
        root,
        DetectorRegistry::with_builtin(),
        OrchestratorOptions::new(),
        ShutdownFlag::new(),
    )
}

fn benchmark_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("check");
    for count in [10, 50, 200].iter() {
        let docs = setup_docs(*count);
        group.bench_with_input(BenchmarkId::new("files", count), count, |b, _| {
            b.iter(|| black_box(orchestrator(docs.path()).check().unwrap()))
        });
    }
    group.finish();
}

fn benchmark_heal(c: &mut Criterion) {
    let mut group = c.benchmark_group("heal");
    group.sample_size(10);
    for count in [10, 50].iter() {
        group.bench_with_input(BenchmarkId::new("files", count), count, |b, &count| {
            b.iter_with_setup(
                || setup_docs(count),
                |docs| black_box(orchestrator(docs.path()).heal(None).unwrap()),
            )
        });
    }
    group.finish();
}

fn benchmark_scoring(c: &mut Criterion) {
    let policy = ThresholdPolicy::default();
    let factors = ConfidenceFactors::new(0.95, 1.0, 0.9, 0.92).unwrap();
    c.bench_function("confidence_score", |b| {
        b.iter(|| policy.action_for(policy.score(black_box(&factors))))
    });

    let expected = Path::new("/docs/api");
    let candidate = Path::new("/docs/api/authentication.md");
    c.bench_function("link_similarity", |b| {
        b.iter(|| similarity(black_box("api/auth.md"), expected, black_box(candidate)))
    });
}

criterion_group!(benches, benchmark_check, benchmark_heal, benchmark_scoring);
criterion_main!(benches);
