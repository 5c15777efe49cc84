//! Query latency over a generated project's index.

use codeindex::analysis::{self, AnalysisRules};
use codeindex::query::QueryEngine;
use codeindex::{Config, Index, Indexer};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_index(num_files: usize) -> Index {
    let dir = tempfile::tempdir().unwrap();
    let pkg = dir.path().join("pkg");
    std::fs::create_dir_all(&pkg).unwrap();
    for m in 0..num_files {
        let mut content = String::new();
        if m > 0 {
            content.push_str(&format!("from pkg.mod_{} import helper_{}\n", m - 1, m - 1));
        }
        content.push_str(&format!("\ndef helper_{}():\n    return {}\n", m, m));
        for i in 0..8 {
            content.push_str(&format!("\ndef handler_{}_{}():\n    helper_{}()\n", m, i, m));
            if m > 0 {
                content.push_str(&format!("    helper_{}()\n", m - 1));
            }
        }
        std::fs::write(pkg.join(format!("mod_{}.py", m)), content).unwrap();
    }
    std::fs::create_dir_all(dir.path().join("tests")).unwrap();
    std::fs::write(
        dir.path().join("tests/test_mod.py"),
        "from pkg.mod_0 import helper_0\n\ndef test_helper():\n    helper_0()\n",
    )
    .unwrap();

    Indexer::new(dir.path(), Config::default()).full_scan().unwrap().index
}

fn bench_queries(c: &mut Criterion) {
    let index = build_index(100);
    let rules = AnalysisRules::default();
    let engine = QueryEngine::new(&index, &rules);

    c.bench_function("find_callers", |b| {
        b.iter(|| black_box(engine.find_callers(black_box("pkg/mod_10.py:helper_10"))))
    });

    c.bench_function("find_callers_bare_name", |b| {
        b.iter(|| black_box(engine.find_callers(black_box("helper_50"))))
    });

    c.bench_function("find_callees", |b| {
        b.iter(|| black_box(engine.find_callees(black_box("handler_50_3"))))
    });

    c.bench_function("impact", |b| b.iter(|| black_box(engine.impact(black_box("pkg/mod_0.py")))));

    c.bench_function("tests_for", |b| b.iter(|| black_box(engine.tests_for(black_box("helper_0")))));

    c.bench_function("coupled", |b| b.iter(|| black_box(engine.coupled(black_box("pkg/mod_50.py"), 5))));
}

fn bench_analysis(c: &mut Criterion) {
    let index = build_index(100);
    let rules = AnalysisRules::default();

    c.bench_function("recompute_analysis", |b| {
        b.iter(|| {
            let mut copy = index.clone();
            analysis::recompute(&mut copy, &rules);
            black_box(copy)
        })
    });

    c.bench_function("engine_new", |b| b.iter(|| black_box(QueryEngine::new(&index, &rules))));
}

criterion_group!(benches, bench_queries, bench_analysis);
criterion_main!(benches);
