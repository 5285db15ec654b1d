//! Resource lifetime integration tests.
//!
//! Covers what the frame ring guarantees across frames: handle ids that are
//! not reissued early, raw objects that outlive the GPU work using them,
//! pools that hand back last frame's objects and age unused ones out, and
//! the swapchain acquire/present cycle.
//!
//! Run with: `cargo test --test resource_lifetime_tests`

mod common;

use common::{Backend, TestContext, buffer_barriers, submissions, texture_barriers};
use rstest::rstest;

use ringframe_graphics::backend::dummy::{DummyEvent, DummyObjectKind};
use ringframe_graphics::{
    AcquiredImage, BufferDescriptor, BufferUsage, ClearValue, Extent3d, PipelineStages,
    QueueKind, RenderContextConfig, RenderGraph, ResourceKind, ResourceState, SwapchainDescriptor,
    SwapchainImage, TextureDescriptor, TextureFormat, TextureUsage,
};

fn sampled(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba8Unorm,
        TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
    )
}

fn bloom_target() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        256,
        256,
        TextureFormat::Rgba16Float,
        TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
    )
}

/// A frame whose graph only uses a pooled storage texture.
fn bloom_frame(tc: &mut TestContext, graph: &mut RenderGraph) {
    tc.ctx.begin_frame().unwrap();
    graph.create_texture("bloom", bloom_target());
    graph.add_fn_pass(
        &tc.ctx,
        "bloom",
        |builder| {
            builder.write_texture("bloom", ResourceState::COMPUTE_STORAGE_WRITE);
        },
        |_, _| Ok(()),
    );
    graph.compile(&mut tc.ctx).unwrap();
    graph.evaluate(&mut tc.ctx).unwrap();
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

/// A frame whose only pass writes a pooled storage buffer on `queue`.
fn scratch_frame(tc: &mut TestContext, graph: &mut RenderGraph, queue: QueueKind) {
    tc.ctx.begin_frame().unwrap();
    graph.create_buffer("scratch", BufferDescriptor::new(4096, BufferUsage::STORAGE));
    graph.add_fn_pass(
        &tc.ctx,
        "fill",
        move |builder| {
            builder
                .queue(queue)
                .write_buffer("scratch", ResourceState::COMPUTE_STORAGE_WRITE);
        },
        |_, _| Ok(()),
    );
    graph.compile(&mut tc.ctx).unwrap();
    graph.evaluate(&mut tc.ctx).unwrap();
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

fn empty_frame(tc: &mut TestContext, graph: &mut RenderGraph) {
    tc.ctx.begin_frame().unwrap();
    graph.compile(&mut tc.ctx).unwrap();
    graph.evaluate(&mut tc.ctx).unwrap();
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}

// ============================================================================
// Handles
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_released_handle_id_waits_out_the_ring(#[case] backend: Backend) {
    let config = RenderContextConfig::default()
        .with_frames_in_flight(2)
        .with_handle_ring_margin(1);
    assert_eq!(config.handle_ring_depth(), 3);
    let Some(mut tc) = TestContext::with_config(backend, config) else {
        return;
    };

    tc.ctx.begin_frame().unwrap();
    let released = tc.ctx.create_texture(&sampled(4, 4)).unwrap();
    tc.ctx.destroy_texture(released);
    assert!(!tc.ctx.resources().is_valid(released));
    tc.ctx.end_frame().unwrap();

    // Two more frames: the id is still aging
    for _ in 0..2 {
        tc.ctx.begin_frame().unwrap();
        let fresh = tc.ctx.create_texture(&sampled(4, 4)).unwrap();
        assert_ne!(fresh.id(), released.id());
        tc.ctx.end_frame().unwrap();
    }

    // Third advance since the release frees the id
    tc.ctx.begin_frame().unwrap();
    let recycled = tc.ctx.create_texture(&sampled(4, 4)).unwrap();
    assert_eq!(recycled.id(), released.id());
    assert_ne!(recycled.generation(), released.generation());
    assert!(tc.ctx.resources().is_valid(recycled));
    assert!(!tc.ctx.resources().is_valid(released));
    tc.ctx.end_frame().unwrap();
}

// ============================================================================
// Deferred destruction
// ============================================================================

#[rstest]
#[case::single_frame(1)]
#[case::double_buffered(2)]
#[case::triple_buffered(3)]
fn test_destroyed_texture_outlives_frames_in_flight(#[case] frames_in_flight: usize) {
    let config = RenderContextConfig::default().with_frames_in_flight(frames_in_flight);
    let Some(mut tc) = TestContext::with_config(Backend::Dummy, config) else {
        return;
    };

    tc.ctx.begin_frame().unwrap();
    let texture = tc.ctx.create_texture(&sampled(16, 16)).unwrap();
    let raw_id = tc.texture_id(texture);
    tc.ctx.destroy_texture(texture);
    tc.ctx.end_frame().unwrap();

    for frame in 1..frames_in_flight {
        tc.ctx.begin_frame().unwrap();
        assert_eq!(
            tc.backend.live_objects(DummyObjectKind::Texture),
            1,
            "texture destroyed early in frame {}",
            frame
        );
        tc.ctx.end_frame().unwrap();
    }

    tc.backend.clear_events();
    tc.ctx.begin_frame().unwrap();
    assert_eq!(tc.backend.live_objects(DummyObjectKind::Texture), 0);

    // The fence of the slot was waited on before the destroy
    let events = tc.backend.events();
    let wait = events
        .iter()
        .position(|e| matches!(e, DummyEvent::WaitFences { .. }))
        .expect("slot fence waited");
    let destroy = events
        .iter()
        .position(|e| {
            *e == DummyEvent::Destroy {
                kind: DummyObjectKind::Texture,
                id: raw_id,
            }
        })
        .expect("texture destroyed");
    assert!(wait < destroy);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_statistics_track_live_and_pending(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    tc.ctx.begin_frame().unwrap();
    let kept = tc.ctx.create_texture(&sampled(8, 8)).unwrap();
    let dropped = tc.ctx.create_texture(&sampled(8, 8)).unwrap();
    tc.ctx.destroy_texture(dropped);

    let stats = tc.ctx.statistics();
    assert_eq!(stats.live(ResourceKind::Texture), 1);
    assert_eq!(stats.pending_destructions, 1);
    assert!(tc.ctx.resources().is_valid(kept));
    tc.ctx.end_frame().unwrap();
}

// ============================================================================
// Pools
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_pooled_texture_reused_every_frame(#[case] backend: Backend) {
    let config = RenderContextConfig::default()
        .with_frames_in_flight(2)
        .with_cache_ring_margin(2);
    let Some(mut tc) = TestContext::with_config(backend, config) else {
        return;
    };
    let mut graph = RenderGraph::new();

    for _ in 0..5 {
        bloom_frame(&mut tc, &mut graph);
    }

    let stats = tc.ctx.caches().statistics().textures;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
    assert_eq!(tc.backend.live_objects(DummyObjectKind::Texture), 1);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_pooled_second_frame_keeps_previous_stages(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let mut graph = RenderGraph::new();
    bloom_frame(&mut tc, &mut graph);

    tc.backend.clear_events();
    bloom_frame(&mut tc, &mut graph);

    // Contents are discarded but the previous write is still waited on
    let barriers = texture_barriers(&tc.backend.events());
    assert_eq!(barriers.len(), 1);
    assert_eq!(
        barriers[0].src,
        ResourceState::COMPUTE_STORAGE_WRITE.with_layout(ringframe_graphics::ImageLayout::Undefined)
    );
    assert_eq!(barriers[0].dst, ResourceState::COMPUTE_STORAGE_WRITE);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_unused_pooled_texture_ages_out(#[case] backend: Backend) {
    let config = RenderContextConfig::default()
        .with_frames_in_flight(2)
        .with_cache_ring_margin(2);
    let depth = config.cache_ring_depth();
    let Some(mut tc) = TestContext::with_config(backend, config) else {
        return;
    };
    let mut graph = RenderGraph::new();
    bloom_frame(&mut tc, &mut graph);

    for _ in 0..depth {
        empty_frame(&mut tc, &mut graph);
    }
    let stats = tc.ctx.caches().statistics().textures;
    assert_eq!(stats.destroyed, 1);
    assert_eq!(stats.resident, 0);
    // Destroyed through the frame ring, not immediately
    assert_eq!(tc.backend.live_objects(DummyObjectKind::Texture), 1);

    empty_frame(&mut tc, &mut graph);
    tc.ctx.begin_frame().unwrap();
    assert_eq!(tc.backend.live_objects(DummyObjectKind::Texture), 0);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::dummy_shared_family(Backend::DummySharedFamily)]
fn test_pooled_buffer_in_flight_on_other_queue_is_not_reused(#[case] backend: Backend) {
    let config = RenderContextConfig::default()
        .with_frames_in_flight(2)
        .with_cache_ring_margin(2);
    let Some(mut tc) = TestContext::with_config(backend, config) else {
        return;
    };
    let mut graph = RenderGraph::new();

    // Frame 0's compute work may still run while frame 1 is recorded
    scratch_frame(&mut tc, &mut graph, QueueKind::Compute);
    scratch_frame(&mut tc, &mut graph, QueueKind::Graphics);
    let stats = tc.ctx.caches().statistics().buffers;
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 0);
    assert_eq!(tc.backend.live_objects(DummyObjectKind::Buffer), 2);

    // Each queue gets its own buffer back, ordered by a plain barrier
    tc.backend.clear_events();
    scratch_frame(&mut tc, &mut graph, QueueKind::Compute);
    let barriers = buffer_barriers(&tc.backend.events());
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].src.stages, PipelineStages::COMPUTE_SHADER);
    assert!(barriers[0].transfer.is_none());

    scratch_frame(&mut tc, &mut graph, QueueKind::Graphics);
    let stats = tc.ctx.caches().statistics().buffers;
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_pooled_buffer_crosses_queues_once_retired(#[case] backend: Backend) {
    let config = RenderContextConfig::default()
        .with_frames_in_flight(2)
        .with_cache_ring_margin(2);
    let Some(mut tc) = TestContext::with_config(backend, config) else {
        return;
    };
    let mut graph = RenderGraph::new();

    scratch_frame(&mut tc, &mut graph, QueueKind::Compute);
    empty_frame(&mut tc, &mut graph);

    // Frame 0's fence was waited on when its slot came around
    tc.backend.clear_events();
    scratch_frame(&mut tc, &mut graph, QueueKind::Graphics);
    let stats = tc.ctx.caches().statistics().buffers;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert!(buffer_barriers(&tc.backend.events()).is_empty());
    assert!(submissions(&tc.backend.events())[0].waits.is_empty());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_two_creates_in_one_frame_get_distinct_textures(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    tc.ctx.begin_frame().unwrap();
    let mut graph = RenderGraph::new();
    graph.create_texture("ping", bloom_target());
    graph.create_texture("pong", bloom_target());
    graph.add_fn_pass(
        &tc.ctx,
        "blur",
        |builder| {
            builder
                .write_texture("ping", ResourceState::COMPUTE_STORAGE_WRITE)
                .write_texture("pong", ResourceState::COMPUTE_STORAGE_WRITE);
        },
        |resources, _| {
            assert_ne!(resources.texture("ping"), resources.texture("pong"));
            Ok(())
        },
    );
    graph.compile(&mut tc.ctx).unwrap();
    graph.evaluate(&mut tc.ctx).unwrap();
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();

    assert_eq!(tc.ctx.caches().statistics().textures.misses, 2);
}

// ============================================================================
// Swapchain
// ============================================================================

fn acquire(tc: &mut TestContext, swapchain: ringframe_graphics::ResourceHandle) -> SwapchainImage {
    match tc.ctx.acquire_next_image(swapchain).unwrap() {
        AcquiredImage::Image(image) => image,
        AcquiredImage::OutOfDate => panic!("swapchain unexpectedly out of date"),
    }
}

fn draw_to(tc: &mut TestContext, graph: &mut RenderGraph, image: &SwapchainImage) {
    graph.import_swapchain_image("backbuffer", image);
    graph.add_fn_pass(
        &tc.ctx,
        "present blit",
        |builder| {
            builder.render().clear_texture(
                "backbuffer",
                ResourceState::COLOR_ATTACHMENT,
                ClearValue::BLACK,
            );
        },
        |_, _| Ok(()),
    );
    graph.compile(&mut tc.ctx).unwrap();
    graph.evaluate(&mut tc.ctx).unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_swapchain_frame_waits_acquire_and_signals_present(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let swapchain = tc
        .ctx
        .create_swapchain(&SwapchainDescriptor::new(320, 240))
        .unwrap();
    let mut graph = RenderGraph::new();

    tc.ctx.begin_frame().unwrap();
    tc.backend.clear_events();
    let image = acquire(&mut tc, swapchain);
    draw_to(&mut tc, &mut graph, &image);
    assert!(!tc.ctx.present(&image).unwrap());
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();

    let events = tc.backend.events();
    let acquired = events
        .iter()
        .find_map(|e| match e {
            DummyEvent::Acquire { semaphore, .. } => Some(*semaphore),
            _ => None,
        })
        .expect("acquire event");
    let presented = events
        .iter()
        .find_map(|e| match e {
            DummyEvent::Present { wait, .. } => Some(*wait),
            _ => None,
        })
        .expect("present event");

    let submits = submissions(&events);
    assert_eq!(submits.len(), 1);
    assert_eq!(
        submits[0].waits,
        vec![(acquired, PipelineStages::COLOR_ATTACHMENT_OUTPUT)]
    );
    assert_eq!(submits[0].signals, vec![presented]);

    // Exported to the presentation layout
    let barriers = texture_barriers(&events);
    assert_eq!(barriers.len(), 2);
    assert_eq!(barriers[1].dst, ResourceState::PRESENT);

    // The presentation engine hands the image back undefined
    assert_eq!(tc.ctx.texture(image.texture).state(), ResourceState::UNDEFINED);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_swapchain_images_rotate(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let swapchain = tc
        .ctx
        .create_swapchain(&SwapchainDescriptor::new(64, 64).with_image_count(3))
        .unwrap();
    let mut graph = RenderGraph::new();

    let mut indices = Vec::new();
    for _ in 0..4 {
        tc.ctx.begin_frame().unwrap();
        let image = acquire(&mut tc, swapchain);
        indices.push(image.index);
        assert_eq!(image.texture, tc.ctx.swapchain(swapchain).images()[image.index as usize]);
        draw_to(&mut tc, &mut graph, &image);
        tc.ctx.present(&image).unwrap();
        graph.clean_up(&mut tc.ctx);
        tc.ctx.end_frame().unwrap();
    }
    assert_eq!(indices, vec![0, 1, 2, 0]);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_out_of_date_swapchain_is_recreated(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let swapchain = tc
        .ctx
        .create_swapchain(&SwapchainDescriptor::new(64, 64))
        .unwrap();
    let old_images = tc.ctx.swapchain(swapchain).images().to_vec();
    let mut graph = RenderGraph::new();

    tc.ctx.begin_frame().unwrap();
    tc.backend.set_surface_out_of_date(true);
    assert_eq!(
        tc.ctx.acquire_next_image(swapchain).unwrap(),
        AcquiredImage::OutOfDate
    );
    tc.ctx
        .resize_swapchain(swapchain, Extent3d::new_2d(128, 96))
        .unwrap();
    tc.backend.set_surface_out_of_date(false);
    tc.ctx.end_frame().unwrap();

    // Old images are gone from the store, new ones have the new size
    for image in &old_images {
        assert!(!tc.ctx.resources().is_valid(*image));
    }
    assert_eq!(tc.ctx.swapchain(swapchain).descriptor().extent.width, 128);
    assert_eq!(tc.backend.live_objects(DummyObjectKind::Swapchain), 2);

    tc.ctx.begin_frame().unwrap();
    let image = acquire(&mut tc, swapchain);
    assert_eq!(tc.ctx.texture(image.texture).size(), Extent3d::new_2d(128, 96));
    draw_to(&mut tc, &mut graph, &image);
    assert!(!tc.ctx.present(&image).unwrap());
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();

    // The retired swapchain is destroyed once its frame slot returns
    tc.ctx.begin_frame().unwrap();
    assert_eq!(tc.backend.live_objects(DummyObjectKind::Swapchain), 1);
    tc.ctx.end_frame().unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_present_reports_resize(#[case] backend: Backend) {
    let Some(mut tc) = TestContext::new(backend) else {
        return;
    };
    let swapchain = tc
        .ctx
        .create_swapchain(&SwapchainDescriptor::new(64, 64))
        .unwrap();
    let mut graph = RenderGraph::new();

    tc.ctx.begin_frame().unwrap();
    let image = acquire(&mut tc, swapchain);
    draw_to(&mut tc, &mut graph, &image);
    tc.backend.set_surface_out_of_date(true);
    assert!(tc.ctx.present(&image).unwrap());
    graph.clean_up(&mut tc.ctx);
    tc.ctx.end_frame().unwrap();
}
