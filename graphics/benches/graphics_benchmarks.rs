use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ringframe_graphics::{
    BufferDescriptor, BufferUsage, ClearValue, DummyBackend, QueueKind, RenderContext,
    RenderContextConfig, RenderGraph, ResourceState, TextureDescriptor, TextureFormat,
    TextureUsage,
};

fn context() -> RenderContext {
    RenderContext::new(Arc::new(DummyBackend::new()), RenderContextConfig::default())
        .expect("dummy context")
}

fn color_target() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        1280,
        720,
        TextureFormat::Rgba16Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

/// Declare a chain of `passes` render passes, each sampling the previous
/// pass's output.
fn declare_chain(ctx: &RenderContext, graph: &mut RenderGraph, passes: usize) {
    for i in 0..passes {
        let output = format!("target_{i}");
        graph.create_texture(&output, color_target());
        let input = i.checked_sub(1).map(|prev| format!("target_{prev}"));
        graph.add_fn_pass(
            ctx,
            &format!("pass_{i}"),
            move |builder| {
                if let Some(input) = &input {
                    builder.read_texture(input, ResourceState::FRAGMENT_SAMPLED);
                }
                builder
                    .render()
                    .clear_texture(&output, ResourceState::COLOR_ATTACHMENT, ClearValue::BLACK);
            },
            |_, _| Ok(()),
        );
    }
}

/// Alternate compute and graphics passes over a shared buffer.
fn declare_async_compute(ctx: &RenderContext, graph: &mut RenderGraph, rounds: usize) {
    graph.create_buffer(
        "particles",
        BufferDescriptor::new(1 << 20, BufferUsage::STORAGE | BufferUsage::VERTEX),
    );
    for i in 0..rounds {
        graph.add_fn_pass(
            ctx,
            &format!("simulate_{i}"),
            |builder| {
                builder
                    .queue(QueueKind::Compute)
                    .write_buffer("particles", ResourceState::COMPUTE_STORAGE_WRITE);
            },
            |_, _| Ok(()),
        );
        graph.add_fn_pass(
            ctx,
            &format!("draw_{i}"),
            |builder| {
                builder.read_buffer("particles", ResourceState::VERTEX_INPUT);
            },
            |_, _| Ok(()),
        );
    }
}

// ---------------------------------------------------------------------------
// Render graph frames
// ---------------------------------------------------------------------------

fn bench_graph_frame_small(c: &mut Criterion) {
    c.bench_function("render_graph_frame_4_passes", |b| {
        let mut ctx = context();
        let mut graph = RenderGraph::new();
        b.iter(|| {
            ctx.begin_frame().unwrap();
            declare_chain(&ctx, &mut graph, 4);
            graph.compile(&mut ctx).unwrap();
            graph.evaluate(&mut ctx).unwrap();
            graph.clean_up(&mut ctx);
            ctx.end_frame().unwrap();
        });
    });
}

fn bench_graph_frame_large(c: &mut Criterion) {
    c.bench_function("render_graph_frame_32_passes_chain", |b| {
        let mut ctx = context();
        let mut graph = RenderGraph::new();
        b.iter(|| {
            ctx.begin_frame().unwrap();
            declare_chain(&ctx, &mut graph, 32);
            graph.compile(&mut ctx).unwrap();
            graph.evaluate(&mut ctx).unwrap();
            graph.clean_up(&mut ctx);
            ctx.end_frame().unwrap();
        });
    });
}

fn bench_graph_frame_async_compute(c: &mut Criterion) {
    c.bench_function("render_graph_frame_async_compute_8_rounds", |b| {
        let mut ctx = context();
        let mut graph = RenderGraph::new();
        b.iter(|| {
            ctx.begin_frame().unwrap();
            declare_async_compute(&ctx, &mut graph, 8);
            graph.compile(&mut ctx).unwrap();
            graph.evaluate(&mut ctx).unwrap();
            black_box(graph.statistics().semaphore_count);
            graph.clean_up(&mut ctx);
            ctx.end_frame().unwrap();
        });
    });
}

// ---------------------------------------------------------------------------
// Resource lifetimes
// ---------------------------------------------------------------------------

fn bench_create_destroy_texture(c: &mut Criterion) {
    c.bench_function("context_create_destroy_texture", |b| {
        let mut ctx = context();
        let descriptor = TextureDescriptor::new_2d(
            256,
            256,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        );
        b.iter(|| {
            ctx.begin_frame().unwrap();
            let texture = ctx.create_texture(black_box(&descriptor)).unwrap();
            ctx.destroy_texture(texture);
            ctx.end_frame().unwrap();
        });
    });
}

fn bench_scratch_writes(c: &mut Criterion) {
    c.bench_function("context_scratch_write_256x64b", |b| {
        let mut ctx = context();
        let data = [0u8; 64];
        b.iter(|| {
            ctx.begin_frame().unwrap();
            for _ in 0..256 {
                black_box(ctx.scratch_write(&data, 256).unwrap());
            }
            ctx.end_frame().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_graph_frame_small,
    bench_graph_frame_large,
    bench_graph_frame_async_compute,
    bench_create_destroy_texture,
    bench_scratch_writes,
);

criterion_main!(benches);
