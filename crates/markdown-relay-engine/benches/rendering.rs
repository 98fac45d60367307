use criterion::{Criterion, criterion_group, criterion_main};
use markdown_relay_engine::{Handler, ParseSession, ParserFlags, RendererFlags, to_html};
use pulldown_cmark::{Options, Parser, html};
mod common;

/// Handler that does nothing, to measure dispatch and attribute decomposition alone.
struct Discard;

impl Handler for Discard {
    type Error = std::convert::Infallible;
}

fn bench_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendering");
    group.sample_size(10);

    let content = common::generate_markdown_content(100);

    group.bench_function("pulldown_cmark_html", |b| {
        b.iter(|| {
            let parser = Parser::new_ext(std::hint::black_box(&content), Options::all());
            let mut out = String::new();
            html::push_html(&mut out, parser);
            std::hint::black_box(out);
        });
    });

    group.bench_function("to_html", |b| {
        b.iter(|| {
            let out = to_html(
                std::hint::black_box(&content),
                ParserFlags::DIALECT_GITHUB,
                RendererFlags::empty(),
            )
            .unwrap();
            std::hint::black_box(out);
        });
    });

    group.bench_function("dispatch_only", |b| {
        b.iter(|| {
            ParseSession::new(ParserFlags::DIALECT_GITHUB)
                .parse(std::hint::black_box(&content), &mut Discard)
                .unwrap();
        });
    });

    group.finish();
}

fn bench_deep_nesting(c: &mut Criterion) {
    let content = common::generate_nested_quotes(50);
    c.bench_function("nested_quotes_to_html", |b| {
        b.iter(|| {
            to_html(
                std::hint::black_box(&content),
                ParserFlags::empty(),
                RendererFlags::empty(),
            )
            .unwrap()
        });
    });
}

criterion_group!(benches, bench_rendering, bench_deep_nesting);
criterion_main!(benches);
