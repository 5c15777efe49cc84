//! Indexing throughput: full scans and incremental updates over generated
//! Python projects.

use codeindex::{Config, Indexer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;
use tempfile::TempDir;

/// Module `module_id` defines `num_functions` functions that each call into
/// the previous module, plus a class whose method calls all of them.
fn generate_python_file(module_id: usize, num_functions: usize) -> String {
    let mut content = String::new();
    if module_id > 0 {
        content.push_str(&format!("from pkg.module_{} import function_{}_0\n", module_id - 1, module_id - 1));
    }

    for i in 0..num_functions {
        content.push_str(&format!(
            r#"
def function_{m}_{i}():
    """Function {i} in module {m}"""
    x = {i}
    y = {j}
    return x + y
"#,
            m = module_id,
            i = i,
            j = i + 1
        ));
        if module_id > 0 {
            content.push_str(&format!("    function_{}_0()\n", module_id - 1));
        }
    }

    content.push_str(&format!(
        r#"

class Module{m}Class:
    def process(self):
        result = 0
"#,
        m = module_id
    ));
    for i in 0..num_functions {
        content.push_str(&format!("        result += function_{}_{}()\n", module_id, i));
    }
    content.push_str("        return result\n");
    content
}

fn generate_project(num_files: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), num_files);
    dir
}

fn write_project(root: &Path, num_files: usize) {
    let pkg = root.join("pkg");
    std::fs::create_dir_all(&pkg).unwrap();
    for i in 0..num_files {
        std::fs::write(pkg.join(format!("module_{}.py", i)), generate_python_file(i, 5)).unwrap();
    }
}

fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");
    group.sample_size(10);

    for num_files in [10, 50, 200].iter() {
        let dir = generate_project(*num_files);
        let indexer = Indexer::new(dir.path(), Config::default());
        group.bench_with_input(BenchmarkId::from_parameter(num_files), num_files, |b, _| {
            b.iter(|| black_box(indexer.full_scan().unwrap()))
        });
    }

    group.finish();
}

fn bench_incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_update");
    group.sample_size(10);

    for num_files in [50, 200].iter() {
        let dir = generate_project(*num_files);
        let indexer = Indexer::new(dir.path(), Config::default());
        let base = indexer.full_scan().unwrap().index;

        group.bench_with_input(BenchmarkId::new("no_changes", num_files), num_files, |b, _| {
            b.iter(|| black_box(indexer.update(base.clone()).unwrap()))
        });

        // One edited file on top of the base index
        let edited = dir.path().join("pkg/module_0.py");
        let original = std::fs::read_to_string(&edited).unwrap();
        std::fs::write(&edited, format!("{}\ndef added():\n    pass\n", original)).unwrap();
        group.bench_with_input(BenchmarkId::new("one_file", num_files), num_files, |b, _| {
            b.iter(|| black_box(indexer.update(base.clone()).unwrap()))
        });
        std::fs::write(&edited, original).unwrap();
    }

    group.finish();
}

criterion_group!(benches, bench_full_scan, bench_incremental_update);
criterion_main!(benches);
