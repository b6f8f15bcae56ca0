//! Compilation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use etsc::*;
use std::fs;
use tempfile::TempDir;

const COUNTER: &str = r#"
@Entry
@Component
struct Counter {
  @State count: number = 0
  build() {
    Column() {
      Text(`${this.count}`)
      Button('+').onClick(() => { this.count++ })
    }
  }
}
"#;

fn list_page(rows: usize) -> String {
    let mut source = String::from(
        "@Reusable\n@Component\nstruct ListRow {\n  @Prop label: string = ''\n  build() {\n    Text(this.label).fontSize(16)\n  }\n}\n\n@Builder\nfunction header(title: string) {\n  Text(title).fontWeight(FontWeight.Bold)\n}\n\n",
    );
    source.push_str("@Entry\n@Component\nstruct Page {\n  @State items: string[] = []\n  @State show: boolean = true\n");
    source.push_str("  build() {\n    Column() {\n      header('list')\n");
    for i in 0..rows {
        source.push_str(&format!(
            "      if (this.show) {{\n        ListRow({{ label: 'row {}' }})\n      }} else {{\n        Text('hidden {}')\n      }}\n",
            i, i
        ));
    }
    source.push_str("      ForEach(this.items, (item: string) => {\n        ListRow({ label: item })\n      }, (item: string) => item)\n    }\n  }\n}\n");
    source
}

fn bench_parse(c: &mut Criterion) {
    let source = list_page(50);
    c.bench_function("parse_list_page", |b| {
        b.iter(|| parse_source(black_box(&source), "Page.ets").unwrap())
    });
}

fn bench_transform(c: &mut Criterion) {
    let source = list_page(50);
    let program = parse_source(&source, "Page.ets").unwrap();
    let tables = ComponentTables::standard();
    let options = TransformOptions::default();
    c.bench_function("transform_list_page", |b| {
        b.iter(|| transform_program(black_box(&program), &tables, &options, "Page.ets"))
    });
}

fn bench_compile_source(c: &mut Criterion) {
    c.bench_function("compile_counter", |b| {
        b.iter(|| compile_source(black_box(COUNTER), "Counter.ets").unwrap())
    });

    let full = CompilerOptions {
        mode: RenderMode::Full,
        ..CompilerOptions::default()
    };
    c.bench_function("compile_counter_full_mode", |b| {
        b.iter(|| compile_source_with_options(black_box(COUNTER), "Counter.ets", &full).unwrap())
    });
}

fn bench_compile_file(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("Page.ets");
    let output_path = temp_dir.path().join("Page.js");
    fs::write(&input_path, list_page(200)).unwrap();

    c.bench_function("compile_file_large_page", |b| {
        b.iter(|| {
            compile_file(
                black_box(input_path.to_str().unwrap()),
                black_box(output_path.to_str().unwrap()),
            )
            .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_transform,
    bench_compile_source,
    bench_compile_file
);
criterion_main!(benches);
