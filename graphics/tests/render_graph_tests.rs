//! Render graph integration tests.
//!
//! Each test declares a small frame, runs it through compile and evaluate on
//! the dummy backend and checks the barriers, submissions and render pass
//! instances that reached the backend.
//!
//! Run with: `cargo test --test render_graph_tests`

mod common;

use common::{
    Backend, TestContext, begun_render_passes, buffer_barriers, labels, submissions,
    texture_barriers,
};
use rstest::rstest;

use ringframe_graphics::sync::QueueTransfer;
use ringframe_graphics::types::{LoadOp, StoreOp};
use ringframe_graphics::{
    BufferDescriptor, BufferUsage, ClearValue, CommandRecorder, GraphState, GraphicsError,
    PipelineStages, QueueKind, RenderGraph, ResourceState, TextureDescriptor, TextureFormat,
    TextureUsage,
};

fn color_target(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

fn storage_target(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba16Float,
        TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
    )
}

fn particle_buffer() -> BufferDescriptor {
    BufferDescriptor::new(4096, BufferUsage::STORAGE | BufferUsage::VERTEX)
}

fn run(tc: &mut TestContext, graph: &mut RenderGraph) {
    graph.compile(&mut tc.ctx).expect("compile failed");
    graph.evaluate(&mut tc.ctx).expect("evaluate failed");
}

// ============================================================================
// Barriers
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::shared_family(Backend::DummySharedFamily)]
fn test_cleared_import_needs_one_barrier(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let target = tc.ctx.create_texture(&color_target(64, 64)).unwrap();

    tc.ctx.begin_frame().unwrap();
    tc.backend.clear_events();

    let mut graph = RenderGraph::new();
    graph.import_texture("target", target, ResourceState::UNDEFINED);
    graph.add_fn_pass(
        &tc.ctx,
        "clear",
        |builder| {
            builder.render().clear_texture(
                "target",
                ResourceState::COLOR_ATTACHMENT,
                ClearValue::Color([0.0, 0.5, 1.0, 1.0]),
            );
        },
        |_, _| Ok(()),
    );
    run(&mut tc, &mut graph);

    assert_eq!(graph.statistics().barrier_count, 1);
    let events = tc.backend.events();
    let barriers = texture_barriers(&events);
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].texture, tc.texture_id(target));
    assert_eq!(barriers[0].src, ResourceState::UNDEFINED);
    assert_eq!(barriers[0].dst, ResourceState::COLOR_ATTACHMENT);
    assert_eq!(barriers[0].transfer, None);

    let passes = begun_render_passes(&events);
    assert_eq!(passes.len(), 1);
    let layout = tc
        .backend
        .render_pass_layout(passes[0])
        .expect("render pass was created through the backend");
    assert_eq!(layout.color_attachments.len(), 1);
    assert_eq!(layout.color_attachments[0].load_op, LoadOp::Clear);
    // Imported textures always keep their contents
    assert_eq!(layout.color_attachments[0].store_op, StoreOp::Store);

    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
    assert_eq!(tc.ctx.texture(target).state(), ResourceState::COLOR_ATTACHMENT);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_storage_write_then_sampled_read(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    tc.ctx.begin_frame().unwrap();
    tc.backend.clear_events();

    let mut graph = RenderGraph::new();
    graph.create_texture("field", storage_target(32, 32));
    graph.add_fn_pass(
        &tc.ctx,
        "simulate",
        |builder| {
            builder.write_texture("field", ResourceState::COMPUTE_STORAGE_WRITE);
        },
        |_, _| Ok(()),
    );
    let shade = graph.add_fn_pass(
        &tc.ctx,
        "shade",
        |builder| {
            builder.read_texture("field", ResourceState::FRAGMENT_SAMPLED);
        },
        |_, _| Ok(()),
    );
    assert_eq!(graph.dependencies(shade).count(), 1);
    run(&mut tc, &mut graph);

    // Discard into General, then the read-after-write transition
    let barriers = texture_barriers(&tc.backend.events());
    assert_eq!(barriers.len(), 2);
    assert_eq!(barriers[0].src.access, ResourceState::UNDEFINED.access);
    assert_eq!(barriers[0].dst, ResourceState::COMPUTE_STORAGE_WRITE);
    assert_eq!(barriers[1].src, ResourceState::COMPUTE_STORAGE_WRITE);
    assert_eq!(barriers[1].dst, ResourceState::FRAGMENT_SAMPLED);

    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_read_after_read_adds_no_barrier(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let lut = tc.ctx.create_texture(&storage_target(16, 16)).unwrap();
    tc.ctx.begin_frame().unwrap();

    let mut graph = RenderGraph::new();
    graph.import_texture("lut", lut, ResourceState::FRAGMENT_SAMPLED);
    for name in ["first", "second", "third"] {
        graph.add_fn_pass(
            &tc.ctx,
            name,
            |builder| {
                builder.read_texture("lut", ResourceState::FRAGMENT_SAMPLED);
            },
            |_, _| Ok(()),
        );
    }
    run(&mut tc, &mut graph);

    assert_eq!(graph.statistics().barrier_count, 0);
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_export_leaves_final_state(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let output = tc.ctx.create_texture(&color_target(16, 16)).unwrap();
    tc.ctx.begin_frame().unwrap();
    tc.backend.clear_events();

    let mut graph = RenderGraph::new();
    graph.import_texture("output", output, ResourceState::UNDEFINED);
    graph.export_texture("output", ResourceState::FRAGMENT_SAMPLED);
    graph.add_fn_pass(
        &tc.ctx,
        "draw",
        |builder| {
            builder.render().clear_texture(
                "output",
                ResourceState::COLOR_ATTACHMENT,
                ClearValue::TRANSPARENT,
            );
        },
        |_, _| Ok(()),
    );
    run(&mut tc, &mut graph);

    let barriers = texture_barriers(&tc.backend.events());
    let last = barriers.last().expect("export barrier");
    assert_eq!(last.src, ResourceState::COLOR_ATTACHMENT);
    assert_eq!(last.dst, ResourceState::FRAGMENT_SAMPLED);

    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
    assert_eq!(tc.ctx.texture(output).state(), ResourceState::FRAGMENT_SAMPLED);
}

// ============================================================================
// Render passes
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_load_and_store_ops_follow_contents(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    tc.ctx.begin_frame().unwrap();
    tc.backend.clear_events();

    let mut graph = RenderGraph::new();
    graph.create_texture("color", color_target(128, 72));
    graph.add_fn_pass(
        &tc.ctx,
        "opaque",
        |builder| {
            builder.render().clear_texture(
                "color",
                ResourceState::COLOR_ATTACHMENT,
                ClearValue::BLACK,
            );
        },
        |_, _| Ok(()),
    );
    graph.add_fn_pass(
        &tc.ctx,
        "transparent",
        |builder| {
            builder
                .render()
                .read_write_texture("color", ResourceState::COLOR_ATTACHMENT);
        },
        |_, _| Ok(()),
    );
    run(&mut tc, &mut graph);

    let passes = begun_render_passes(&tc.backend.events());
    assert_eq!(passes.len(), 2);
    let opaque = tc.backend.render_pass_layout(passes[0]).unwrap();
    let transparent = tc.backend.render_pass_layout(passes[1]).unwrap();

    assert_eq!(opaque.color_attachments[0].load_op, LoadOp::Clear);
    assert_eq!(opaque.color_attachments[0].store_op, StoreOp::Store);
    assert_eq!(transparent.color_attachments[0].load_op, LoadOp::Load);
    // Nothing reads the graph-owned target afterwards
    assert_eq!(transparent.color_attachments[0].store_op, StoreOp::DontCare);

    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_render_pass_and_framebuffer_are_cached(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let target = tc.ctx.create_texture(&color_target(32, 32)).unwrap();
    let mut graph = RenderGraph::new();

    for _ in 0..3 {
        tc.ctx.begin_frame().unwrap();
        graph.import_texture("target", target, ResourceState::UNDEFINED);
        graph.add_fn_pass(
            &tc.ctx,
            "clear",
            |builder| {
                builder.render().clear_texture(
                    "target",
                    ResourceState::COLOR_ATTACHMENT,
                    ClearValue::BLACK,
                );
            },
            |_, _| Ok(()),
        );
        run(&mut tc, &mut graph);
        graph.clean_up(&mut tc.ctx);
        tc.ctx.end_frame().unwrap();
    }

    let stats = tc.ctx.caches().statistics();
    assert_eq!(stats.render_passes.misses, 1);
    assert_eq!(stats.render_passes.hits, 2);
    assert_eq!(stats.framebuffers.misses, 1);
    assert_eq!(stats.framebuffers.hits, 2);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[should_panic(expected = "is not a render pass")]
fn test_clear_outside_render_pass_panics(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        panic!("is not a render pass");
    };
    tc.ctx.begin_frame().unwrap();
    let mut graph = RenderGraph::new();
    graph.create_texture("color", color_target(8, 8));
    graph.add_fn_pass(
        &tc.ctx,
        "clear",
        |builder| {
            builder.clear_texture("color", ResourceState::COLOR_ATTACHMENT, ClearValue::BLACK);
        },
        |_, _| Ok(()),
    );
    let _ = graph.compile(&mut tc.ctx);
}

// ============================================================================
// Cross-queue work
// ============================================================================

#[rstest]
#[case::separate_families(Backend::Dummy, 2, 1)]
#[case::shared_family(Backend::DummySharedFamily, 1, 0)]
fn test_compute_to_graphics_handoff(
    #[case] backend: Backend,
    #[case] expected_barriers: usize,
    #[case] expected_transfers: usize,
) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    tc.ctx.begin_frame().unwrap();
    tc.backend.clear_events();

    let mut graph = RenderGraph::new();
    graph.create_buffer("particles", particle_buffer());
    graph.add_fn_pass(
        &tc.ctx,
        "simulate",
        |builder| {
            builder
                .queue(QueueKind::Compute)
                .write_buffer("particles", ResourceState::COMPUTE_STORAGE_WRITE);
        },
        |_, _| Ok(()),
    );
    graph.add_fn_pass(
        &tc.ctx,
        "draw",
        |builder| {
            builder.read_buffer("particles", ResourceState::VERTEX_INPUT);
        },
        |_, _| Ok(()),
    );
    run(&mut tc, &mut graph);

    let stats = graph.statistics();
    assert_eq!(stats.barrier_count, expected_barriers);
    assert_eq!(stats.ownership_transfers, expected_transfers);
    assert_eq!(stats.semaphore_count, 1);
    assert_eq!(stats.submission_count, 2);

    let events = tc.backend.events();
    let submits = submissions(&events);
    assert_eq!(submits.len(), 2);
    assert_eq!(submits[0].queue, QueueKind::Compute);
    assert_eq!(submits[1].queue, QueueKind::Graphics);
    assert_eq!(submits[0].signals.len(), 1);
    assert_eq!(
        submits[1].waits,
        vec![(submits[0].signals[0], PipelineStages::VERTEX_INPUT)]
    );
    // Every queue's last submission closes the frame slot
    assert!(submits.iter().all(|s| s.fenced));

    let barriers = buffer_barriers(&events);
    assert_eq!(barriers.len(), expected_barriers);
    if expected_transfers == 1 {
        let transfer = Some(QueueTransfer {
            src_family: 1,
            dst_family: 0,
        });
        assert_eq!(barriers[0].transfer, transfer);
        assert_eq!(barriers[0].src, ResourceState::COMPUTE_STORAGE_WRITE);
        assert_eq!(barriers[0].dst.stages, PipelineStages::BOTTOM_OF_PIPE);
        assert_eq!(barriers[1].transfer, transfer);
        assert_eq!(barriers[1].src.stages, PipelineStages::TOP_OF_PIPE);
        assert_eq!(barriers[1].dst, ResourceState::VERTEX_INPUT);
    } else {
        assert_eq!(barriers[0].transfer, None);
        assert_eq!(barriers[0].src, ResourceState::COMPUTE_STORAGE_WRITE);
        assert_eq!(barriers[0].dst, ResourceState::VERTEX_INPUT);
    }

    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_import_owned_by_other_queue_gets_prologue_release(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let vertices = tc
        .ctx
        .create_buffer(&BufferDescriptor::new(
            256,
            BufferUsage::VERTEX | BufferUsage::COPY_DST,
        ))
        .unwrap();

    tc.ctx.begin_frame().unwrap();
    let mut upload = CommandRecorder::begin(&mut tc.ctx, QueueKind::Transfer).unwrap();
    upload.buffer_barrier(vertices, ResourceState::TRANSFER_DST);
    upload.submit().unwrap();
    assert_eq!(tc.ctx.buffer(vertices).owner(), Some(QueueKind::Transfer));
    tc.backend.clear_events();

    let mut graph = RenderGraph::new();
    graph.import_buffer("vertices", vertices, ResourceState::TRANSFER_DST);
    graph.add_fn_pass(
        &tc.ctx,
        "draw",
        |builder| {
            builder.read_buffer("vertices", ResourceState::VERTEX_INPUT);
        },
        |_, _| Ok(()),
    );
    run(&mut tc, &mut graph);

    assert_eq!(graph.statistics().ownership_transfers, 1);
    let submits = submissions(&tc.backend.events());
    assert_eq!(submits.len(), 2);
    assert_eq!(submits[0].queue, QueueKind::Transfer);
    assert_eq!(submits[1].queue, QueueKind::Graphics);
    assert_eq!(submits[1].waits.len(), 1);
    assert_eq!(submits[1].waits[0].0, submits[0].signals[0]);

    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
    assert_eq!(tc.ctx.buffer(vertices).owner(), Some(QueueKind::Graphics));
    assert_eq!(tc.ctx.buffer(vertices).state(), ResourceState::VERTEX_INPUT);
    assert_eq!(tc.ctx.buffer(vertices).last_used_frame(), Some(0));
}

// ============================================================================
// Submission and evaluation
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_same_queue_passes_share_one_submission(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    tc.ctx.begin_frame().unwrap();
    tc.backend.clear_events();

    let mut graph = RenderGraph::new();
    graph.create_texture("color", color_target(16, 16));
    graph.add_fn_pass(
        &tc.ctx,
        "base",
        |builder| {
            builder.render().clear_texture(
                "color",
                ResourceState::COLOR_ATTACHMENT,
                ClearValue::BLACK,
            );
        },
        |_, _| Ok(()),
    );
    graph.add_fn_pass(
        &tc.ctx,
        "decals",
        |builder| {
            builder
                .render()
                .read_write_texture("color", ResourceState::COLOR_ATTACHMENT);
        },
        |_, _| Ok(()),
    );
    graph.add_fn_pass(
        &tc.ctx,
        "resolve",
        |builder| {
            builder.read_texture("color", ResourceState::FRAGMENT_SAMPLED);
        },
        |_, _| Ok(()),
    );
    run(&mut tc, &mut graph);

    let events = tc.backend.events();
    let submits = submissions(&events);
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].command_buffers.len(), 3);
    assert_eq!(labels(&events), vec!["base", "decals", "resolve"]);

    let timings = &graph.statistics().pass_timings;
    assert_eq!(timings.len(), 3);
    assert_eq!(timings[2].name, "resolve");

    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_execute_error_is_returned(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    tc.ctx.begin_frame().unwrap();

    let mut graph = RenderGraph::new();
    graph.create_buffer("scratch", particle_buffer());
    graph.add_fn_pass(
        &tc.ctx,
        "broken",
        |builder| {
            builder.write_buffer("scratch", ResourceState::COMPUTE_STORAGE_WRITE);
        },
        |_, _| Err(GraphicsError::InvalidParameter("bad dispatch size".to_string())),
    );
    graph.compile(&mut tc.ctx).unwrap();

    let result = graph.evaluate(&mut tc.ctx);
    assert_eq!(
        result,
        Err(GraphicsError::InvalidParameter(
            "bad dispatch size".to_string()
        ))
    );
    assert_eq!(graph.state(), GraphState::Compiled);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_clean_up_allows_redeclaring(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let mut graph = RenderGraph::new();

    for frame in 0..4 {
        tc.ctx.begin_frame().unwrap();
        graph.create_buffer("particles", particle_buffer());
        graph.add_fn_pass(
            &tc.ctx,
            "simulate",
            |builder| {
                builder
                    .queue(QueueKind::Compute)
                    .write_buffer("particles", ResourceState::COMPUTE_STORAGE_WRITE);
            },
            |_, _| Ok(()),
        );
        graph.add_fn_pass(
            &tc.ctx,
            "draw",
            |builder| {
                builder.read_buffer("particles", ResourceState::VERTEX_INPUT);
            },
            |_, _| Ok(()),
        );
        run(&mut tc, &mut graph);
        assert_eq!(graph.state(), GraphState::Evaluated, "frame {}", frame);
        graph.clean_up(&mut tc.ctx);
        assert_eq!(graph.pass_count(), 0);
        tc.ctx.end_frame().unwrap();
    }
}

// ============================================================================
// Declaration errors
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[should_panic(expected = "reads 'history' before any pass wrote it")]
fn test_read_before_write_panics(#[case] backend: Backend) {
    let Some(tc) = TestContext::new(backend) else {
        panic!("reads 'history' before any pass wrote it");
    };
    let mut graph = RenderGraph::new();
    graph.create_texture("history", storage_target(8, 8));
    graph.add_fn_pass(
        &tc.ctx,
        "reproject",
        |builder| {
            builder.read_texture("history", ResourceState::COMPUTE_SAMPLED);
        },
        |_, _| Ok(()),
    );
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[should_panic(expected = "graph resource 'gbuffer' was never imported or created")]
fn test_undeclared_resource_panics(#[case] backend: Backend) {
    let Some(tc) = TestContext::new(backend) else {
        panic!("graph resource 'gbuffer' was never imported or created");
    };
    let mut graph = RenderGraph::new();
    graph.add_fn_pass(
        &tc.ctx,
        "lighting",
        |builder| {
            builder.read_texture("gbuffer", ResourceState::FRAGMENT_SAMPLED);
        },
        |_, _| Ok(()),
    );
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[should_panic(expected = "already compiled")]
fn test_add_pass_after_compile_panics(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        panic!("already compiled");
    };
    tc.ctx.begin_frame().unwrap();
    let mut graph = RenderGraph::new();
    graph.compile(&mut tc.ctx).unwrap();
    graph.add_fn_pass(&tc.ctx, "late", |_| {}, |_, _| Ok(()));
}
