use std::time::Instant;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use marginalia_core::scroll::ScrollSample;
use marginalia_core::{
    Document, IndexBuilder, IndexConfig, MarginaliaConfig, Page, ReadingTimeAnalyzer, ReadingTimeConfig, augment_static,
};

/// A page with `sections` h2 sections, each with two h3 subsections.
fn synthetic_page(sections: usize) -> String {
    let mut body = String::new();
    for i in 0..sections {
        body.push_str(&format!("<h2>Section {i}</h2><p>{}</p>", "lorem ipsum dolor sit amet ".repeat(40)));
        for j in 0..2 {
            body.push_str(&format!("<h3>Detail {i}.{j}</h3><p>{}</p>", "consectetur adipiscing elit ".repeat(20)));
        }
    }
    format!(
        r#"<html><body><nav data-toc></nav><span data-reading-time></span><main><h1>Guide</h1>{}</main></body></html>"#,
        body
    )
}

fn bench_parse(c: &mut Criterion) {
    let small = synthetic_page(5);
    let large = synthetic_page(200);

    let mut group = c.benchmark_group("parse");
    group.bench_with_input(BenchmarkId::new("small", "5 sections"), &small, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });
    group.bench_with_input(BenchmarkId::new("large", "200 sections"), &large, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });
    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let html = std::fs::read_to_string("../../tests/fixtures/docs_page.html").unwrap();
    let large = synthetic_page(200);
    let builder = IndexBuilder::new(IndexConfig::default());

    let mut group = c.benchmark_group("index");
    group.bench_with_input(BenchmarkId::new("fixture", "docs_page"), &html, |b, html| {
        b.iter(|| builder.run(black_box(html)))
    });
    group.bench_with_input(BenchmarkId::new("synthetic", "200 sections"), &large, |b, html| {
        b.iter(|| builder.run(black_box(html)))
    });
    group.finish();
}

fn bench_reading_time(c: &mut Criterion) {
    let html = synthetic_page(200);
    let analyzer = ReadingTimeAnalyzer::new(ReadingTimeConfig::default());

    c.bench_function("reading_time", |b| b.iter(|| analyzer.run(black_box(&html))));
}

fn bench_static_pipeline(c: &mut Criterion) {
    let html = std::fs::read_to_string("../../tests/fixtures/docs_page.html").unwrap();

    c.bench_function("augment_static", |b| b.iter(|| augment_static(black_box(&html))));
}

fn bench_scroll(c: &mut Criterion) {
    let html = std::fs::read_to_string("../../tests/fixtures/docs_page.html").unwrap();
    let config = MarginaliaConfig::builder().metadata_enabled(false).build();

    c.bench_function("scroll_1000_samples", |b| {
        b.iter(|| {
            let mut page = Page::ready(&html, config.clone()).unwrap();
            let now = Instant::now();
            for offset in (0..1000).map(|i| (i * 7) % 900) {
                page.scroll(ScrollSample::new(offset, 4000, 800), now);
                page.frame();
            }
            black_box(page.scroll_state().active.len())
        })
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_index,
    bench_reading_time,
    bench_static_pipeline,
    bench_scroll
);
criterion_main!(benches);
