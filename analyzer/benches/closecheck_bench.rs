//! Benchmarks for summarization and checking of generated programs

use analyzer::closecheck::{analyze, check, summarize, FactStore};
use analyzer::config::Config;
use analyzer::loader::{load_tree, SourceTree};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// A chain of delegating closers followed by functions that use them
fn generate_delegation_chain(length: usize) -> String {
    let mut code = String::from("package app\n\nimport (\n    \"io\"\n    \"net/http\"\n    \"os\"\n)\n\n");

    code.push_str("func release0(c io.Closer) {\n    c.Close()\n}\n\n");
    for i in 1..length {
        code.push_str(&format!(
            "func release{}(c io.Closer) {{\n    release{}(c)\n}}\n\n",
            i,
            i - 1
        ));
    }

    for i in 0..length {
        code.push_str(&format!(
            "func use{i}() error {{\n    f, err := os.Open(\"file{i}\")\n    if err != nil {{\n        return err\n    }}\n    defer release{i}(f)\n\n    res, err := http.Get(\"https://example.com\")\n    if err != nil {{\n        return err\n    }}\n    return res.Body.Close()\n}}\n\n",
            i = i
        ));
    }

    code
}

/// Many packages, each importing the previous one
fn generate_package_tree(count: usize) -> SourceTree {
    let mut tree = SourceTree::new();

    for i in 0..count {
        let import = if i == 0 {
            "\"io\"".to_string()
        } else {
            format!("\"io\"\n    \"pkg{}\"", i - 1)
        };
        let delegate = if i == 0 {
            "c.Close()".to_string()
        } else {
            format!("pkg{}.Release(c)", i - 1)
        };
        tree.add_file(
            &format!("pkg{}", i),
            "lib.go",
            format!(
                "package pkg{i}\n\nimport (\n    {import}\n)\n\nfunc Release(c io.Closer) {{\n    {delegate}\n}}\n\nfunc Keep(c io.Closer) io.Closer {{\n    return c\n}}\n",
                i = i,
                import = import,
                delegate = delegate
            ),
        );
    }

    tree
}

fn benchmark_single_package(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_package");
    let config = Config::default();

    for length in [10, 50, 200].iter() {
        let mut tree = SourceTree::new();
        tree.add_file("app", "app.go", generate_delegation_chain(*length));
        let program = load_tree(&tree, &[], &config).expect("generated program loads");

        group.bench_with_input(BenchmarkId::new("summarize", length), &program, |b, program| {
            b.iter(|| {
                let facts = summarize(black_box(program), &config.analysis);
                black_box(facts)
            });
        });

        let facts = summarize(&program, &config.analysis).expect("summarize");
        group.bench_with_input(BenchmarkId::new("check", length), &program, |b, program| {
            b.iter(|| black_box(check(black_box(program), &facts, &config.analysis)));
        });
    }

    group.finish();
}

fn benchmark_package_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("package_levels");
    let config = Config::default();

    for count in [10, 50].iter() {
        let tree = generate_package_tree(*count);
        let program = load_tree(&tree, &[], &config).expect("generated program loads");

        group.bench_with_input(BenchmarkId::from_parameter(count), &program, |b, program| {
            b.iter(|| {
                let findings = analyze(black_box(program), &FactStore::new(), &config.analysis);
                black_box(findings)
            });
        });
    }

    group.finish();
}

fn benchmark_loading(c: &mut Criterion) {
    let config = Config::default();
    let mut tree = SourceTree::new();
    tree.add_file("app", "app.go", generate_delegation_chain(100));

    c.bench_function("load_and_type_check", |b| {
        b.iter(|| black_box(load_tree(black_box(&tree), &[], &config)));
    });
}

criterion_group!(
    benches,
    benchmark_single_package,
    benchmark_package_levels,
    benchmark_loading
);

criterion_main!(benches);
