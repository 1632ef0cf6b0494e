//! Performance benchmarks for dynamic call sites.
//!
//! Each benchmark runs a tight script loop over one kind of site (global
//! call, prototype method call, inherited member read) under every
//! [`CacheMode`], so the cost of the inline caches can be compared against
//! the uncached lookup paths.
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lumen::{CacheMode, Engine, EngineConfig, Value};
use lumen_syntax::build::*;
use lumen_syntax::{BinaryOp, Node};
use std::hint::black_box;

const ITERATIONS: u64 = 1000;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

/// Call at the end of each benchmark iteration to flush profiling data.
#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

const MODES: [(&str, CacheMode); 3] = [
    ("enabled", CacheMode::Enabled),
    ("always_rebind", CacheMode::AlwaysRebind),
    ("disabled", CacheMode::Disabled),
];

/// `function drive() { var i = 0; while (i < N) { <site>; i = i + 1; } return i; }`
fn driver(site: Node) -> Node {
    function_decl(
        "drive",
        &[],
        vec![
            var("i", Some(num(0.0))),
            while_loop(
                binary(BinaryOp::Less, ident("i"), num(ITERATIONS as f64)),
                block(vec![site, assign(ident("i"), add(ident("i"), num(1.0)))]),
            ),
            ret(Some(ident("i"))),
        ],
    )
}

/// An engine with the shared fixture loaded and `drive` defined around `site`.
fn engine_for(mode: CacheMode, site: Node) -> (Engine, Value) {
    let mut engine = Engine::with_config(EngineConfig::new().with_cache_mode(mode));
    engine
        .eval(program(vec![
            function_decl("helper", &[], vec![ret(Some(num(1.0)))]),
            var(
                "proto",
                Some(object(vec![
                    ("v", num(1.0)),
                    (
                        "m",
                        function_expr(None, &[], vec![ret(Some(member(this(), "v")))]),
                    ),
                ])),
            ),
            var(
                "o",
                Some(method_call(ident("Object"), "create", vec![ident("proto")])),
            ),
            driver(site),
        ]))
        .unwrap();
    let drive = engine.global("drive").unwrap();
    (engine, drive)
}

fn bench_site(c: &mut Criterion, group_name: &str, site: fn() -> Node) {
    setup_profiler();

    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(ITERATIONS));

    for (label, mode) in MODES {
        let (mut engine, drive) = engine_for(mode, site());
        let global = Value::Object(engine.global_object());
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                let result = engine.call(black_box(&drive), global.clone(), &[]).unwrap();
                end_profiling_frame();
                black_box(result)
            });
        });
    }

    group.finish();
}

fn global_call_benchmarks(c: &mut Criterion) {
    bench_site(c, "global_call", || call(ident("helper"), vec![]));
}

fn method_call_benchmarks(c: &mut Criterion) {
    bench_site(c, "method_call", || method_call(ident("o"), "m", vec![]));
}

fn member_read_benchmarks(c: &mut Criterion) {
    bench_site(c, "member_read", || member(ident("o"), "v"));
}

criterion_group!(
    benches,
    global_call_benchmarks,
    method_call_benchmarks,
    member_read_benchmarks
);

criterion_main!(benches);
