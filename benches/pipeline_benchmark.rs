//! Benchmarks for the manuscript pipeline.
//!
//! Run with: cargo bench
//!
//! These benchmarks use synthetic Markdown manuscripts of growing size.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ieeefmt::{ExportFormat, RuleSet};

const AUTHORS: [&str; 10] = [
    "Adams", "Baker", "Clark", "Davis", "Evans", "Foster", "Green", "Hughes", "Irwin", "Jones",
];

const HEADINGS: [&str; 7] = [
    "Conclusion",
    "Results",
    "1. Introduction",
    "Methods",
    "Abstract",
    "Related Work",
    "Discussion",
];

/// Creates a Markdown manuscript with out-of-order sections and
/// author-year citations.
fn create_manuscript(paragraphs_per_section: usize) -> String {
    let mut text = String::from("# Synthetic Manuscript\n\nJane Doe\n\nExample University\n\n");
    for (i, heading) in HEADINGS.iter().enumerate() {
        text.push_str(&format!("## {}\n\n", heading));
        for p in 0..paragraphs_per_section {
            text.push_str(&format!(
                "Paragraph {} of section {} builds on earlier work ({}, 20{:02}).\n\n",
                p,
                i,
                AUTHORS[p % 10],
                p % 10
            ));
        }
    }
    text.push_str("## References\n\n");
    for n in 0..10 {
        text.push_str(&format!("- {}, A. Title {}. 20{:02}.\n\n", AUTHORS[n], n, n));
    }
    text
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    for size in [5, 50, 200] {
        let data = create_manuscript(size);
        group.bench_function(format!("{}_paragraphs", size), |b| {
            b.iter(|| ieeefmt::parse(black_box(data.as_bytes())))
        });
    }

    group.finish();
}

fn bench_detection(c: &mut Criterion) {
    let doc = ieeefmt::parse(create_manuscript(50).as_bytes()).expect("synthetic manuscript");
    let rules = RuleSet::default();
    c.bench_function("detect_issues", |b| {
        b.iter(|| ieeefmt::detect_issues_with(black_box(&doc), &rules))
    });
}

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    let rules = RuleSet::default();

    for size in [5, 50, 200] {
        let doc = ieeefmt::parse(create_manuscript(size).as_bytes()).expect("synthetic manuscript");
        group.bench_function(format!("{}_paragraphs", size), |b| {
            b.iter(|| ieeefmt::apply_formatting(black_box(&doc), &rules))
        });
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let doc = ieeefmt::parse(create_manuscript(50).as_bytes()).expect("synthetic manuscript");
    let (formatted, _) =
        ieeefmt::apply_formatting(&doc, &RuleSet::default()).expect("formatting succeeds");

    let mut group = c.benchmark_group("export");
    for format in ExportFormat::ALL.into_iter().filter(|f| f.is_available()) {
        group.bench_function(format.name(), |b| {
            b.iter(|| ieeefmt::export(black_box(&formatted), format))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parsing,
    bench_detection,
    bench_formatting,
    bench_export
);
criterion_main!(benches);
