//! Device scenarios against the null backend

use std::time::Duration;

use super::*;
use crate::backend::{FenceResult, NullBackend, NullBackendProbe};
use crate::descriptors::{
    BufferDesc, Format, PresentMode, PrimitiveTopology, ReadbackBufferDesc, ReadbackTextureDesc, ResourceViewDesc,
    ShaderDesc, ShaderResourceCategory, ShaderStage, SwapChainDesc, TextureDesc, TextureResourceViewDesc, TextureType,
};

fn device_with(config: DeviceConfig) -> (Device, NullBackendProbe) {
    let backend = NullBackend::new();
    let probe = backend.probe();
    let device = Device::new(Box::new(backend), config).expect("Should create device");
    (device, probe)
}

fn device() -> (Device, NullBackendProbe) {
    device_with(DeviceConfig::default())
}

fn flush(device: &Device) {
    device.begin_frame(0).expect("Should begin frame");
    device.end_frame().expect("Should end frame");
}

fn shader_desc() -> ShaderDesc {
    ShaderDesc::default()
        .with_stage(ShaderStage::Vertex, &[1, 2, 3])
        .with_stage(ShaderStage::Pixel, &[4, 5, 6])
        .with_bindings(vec![
            ShaderResourceBinding::new("BaseTexture", ShaderResourceCategory::Texture, 0),
            ShaderResourceBinding::new("BaseSampler", ShaderResourceCategory::Sampler, 1),
            ShaderResourceBinding::new("PerObject", ShaderResourceCategory::ConstantBuffer, 0)
                .in_group(1)
                .with_block_size(64),
        ])
}

fn sampled_texture() -> TextureDesc {
    TextureDesc {
        immutable: false,
        ..TextureDesc::texture_2d(64, 64, Format::Rgba8Unorm)
    }
}

fn swap_chain_desc() -> SwapChainDesc {
    SwapChainDesc {
        window_id: 1,
        width: 1280,
        height: 720,
        back_buffer_format: Format::Rgba8Unorm,
        present_mode: PresentMode::VSync,
        allow_shader_resource_view: false,
    }
}

struct PipelineParts {
    shader: ShaderHandle,
    blend: BlendStateHandle,
    rasterizer: RasterizerStateHandle,
    depth_stencil: DepthStencilStateHandle,
    pipeline: GraphicsPipelineHandle,
}

fn create_pipeline(device: &Device) -> PipelineParts {
    let shader = device.create_shader(&shader_desc()).expect("Should create shader");
    let blend = device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");
    let rasterizer = device
        .create_rasterizer_state(&RasterizerStateDesc::default())
        .expect("Should create rasterizer state");
    let depth_stencil = device
        .create_depth_stencil_state(&DepthStencilStateDesc::default())
        .expect("Should create depth-stencil state");
    let pipeline = device
        .create_graphics_pipeline(&GraphicsPipelineDesc {
            shader,
            vertex_declaration: VertexDeclarationHandle::invalid(),
            rasterizer_state: rasterizer,
            blend_state: blend,
            depth_stencil_state: depth_stencil,
            topology: PrimitiveTopology::Triangles,
        })
        .expect("Should create pipeline");

    PipelineParts {
        shader,
        blend,
        rasterizer,
        depth_stencil,
        pipeline,
    }
}

#[test]
fn test_device_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Device>();
}

#[test]
fn test_zero_size_buffer_leaves_tables_untouched() {
    let (device, probe) = device();

    let result = device.create_buffer(&BufferDesc::vertex(32, 0, false), &[]);

    assert!(matches!(result, Err(GalError::Validation(_))));
    assert_eq!(device.object_count(ObjectKind::Buffer), 0);
    assert_eq!(device.dead_object_count(), 0);
    assert_eq!(probe.created(ObjectKind::Buffer), 0);
}

#[test]
fn test_identical_blend_states_share_one_object() {
    let (device, probe) = device();

    let a = device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");
    let b = device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");
    assert_eq!(a, b);
    assert_eq!(device.ref_count(a), Some(2));
    assert_eq!(probe.created(ObjectKind::BlendState), 1);

    device.destroy_blend_state(a);
    device.destroy_blend_state(b);
    assert_eq!(device.ref_count(a), Some(0));
    assert_eq!(device.dead_object_count(), 1);
    assert!(device.is_pending_destruction(a));
    assert_eq!(device.object_count(ObjectKind::BlendState), 1);

    flush(&device);
    assert_eq!(device.object_count(ObjectKind::BlendState), 0);
    assert_eq!(probe.destroyed(ObjectKind::BlendState), 1);
    assert!(!device.contains(a));
}

#[test]
fn test_distinct_descriptors_get_distinct_objects() {
    let (device, _probe) = device();

    let opaque = device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");
    let blended = device.create_blend_state(&BlendStateDesc::alpha_blended()).expect("Should create blend state");

    assert_ne!(opaque, blended);
    assert_eq!(device.object_count(ObjectKind::BlendState), 2);
}

#[test]
fn test_revival_before_flush_keeps_backend_object() {
    let (device, probe) = device();

    let sampler = device.create_sampler_state(&SamplerStateDesc::default()).expect("Should create sampler");
    device.destroy_sampler_state(sampler);
    assert!(device.is_pending_destruction(sampler));

    let revived = device.create_sampler_state(&SamplerStateDesc::default()).expect("Should create sampler");
    assert_eq!(revived, sampler);
    assert_eq!(device.ref_count(revived), Some(1));
    assert!(!device.is_pending_destruction(revived));

    flush(&device);
    assert!(device.contains(revived));
    assert_eq!(probe.created(ObjectKind::SamplerState), 1);
    assert_eq!(probe.destroyed(ObjectKind::SamplerState), 0);
}

#[test]
fn test_flush_is_idempotent() {
    let (device, probe) = device();

    let rasterizer = device
        .create_rasterizer_state(&RasterizerStateDesc::default())
        .expect("Should create rasterizer state");
    device.destroy_rasterizer_state(rasterizer);

    flush(&device);
    flush(&device);
    // Releasing a destroyed handle only warns
    device.destroy_rasterizer_state(rasterizer);
    flush(&device);

    assert_eq!(probe.destroyed(ObjectKind::RasterizerState), 1);
    assert_eq!(probe.unknown_destroys(), 0);
    assert_eq!(device.statistics().frames_completed, 3);
}

#[test]
fn test_composite_destruction_cascades_in_one_flush() {
    let (device, probe) = device();
    let parts = create_pipeline(&device);

    // The pipeline keeps its components alive
    device.destroy_shader(parts.shader);
    device.destroy_blend_state(parts.blend);
    device.destroy_rasterizer_state(parts.rasterizer);
    device.destroy_depth_stencil_state(parts.depth_stencil);
    assert_eq!(device.ref_count(parts.shader), Some(1));
    assert_eq!(device.dead_object_count(), 0);

    device.destroy_graphics_pipeline(parts.pipeline);
    flush(&device);

    assert_eq!(device.statistics().total_objects(), 0);
    assert_eq!(device.dead_object_count(), 0);
    assert_eq!(probe.live_total(), 0);
    assert_eq!(probe.unknown_destroys(), 0);
}

#[test]
fn test_composite_cascade_spares_externally_held_components() {
    let (device, probe) = device();
    let parts = create_pipeline(&device);

    device.destroy_shader(parts.shader);
    device.destroy_rasterizer_state(parts.rasterizer);
    device.destroy_depth_stencil_state(parts.depth_stencil);
    device.destroy_graphics_pipeline(parts.pipeline);
    flush(&device);

    assert!(!device.contains(parts.pipeline));
    assert!(!device.contains(parts.shader));
    assert_eq!(device.ref_count(parts.blend), Some(1));
    assert_eq!(probe.live(ObjectKind::BlendState), 1);
}

#[test]
fn test_revived_pipeline_keeps_component_references() {
    let (device, _probe) = device();
    let parts = create_pipeline(&device);
    let desc = GraphicsPipelineDesc {
        shader: parts.shader,
        vertex_declaration: VertexDeclarationHandle::invalid(),
        rasterizer_state: parts.rasterizer,
        blend_state: parts.blend,
        depth_stencil_state: parts.depth_stencil,
        topology: PrimitiveTopology::Triangles,
    };

    device.destroy_graphics_pipeline(parts.pipeline);
    let revived = device.create_graphics_pipeline(&desc).expect("Should revive pipeline");

    assert_eq!(revived, parts.pipeline);
    // One reference from the caller, one from the pipeline
    assert_eq!(device.ref_count(parts.blend), Some(2));
}

#[test]
fn test_pipeline_rejects_missing_components() {
    let (device, _probe) = device();
    let parts = create_pipeline(&device);

    let unset = GraphicsPipelineDesc {
        shader: ShaderHandle::invalid(),
        vertex_declaration: VertexDeclarationHandle::invalid(),
        rasterizer_state: parts.rasterizer,
        blend_state: parts.blend,
        depth_stencil_state: parts.depth_stencil,
        topology: PrimitiveTopology::Lines,
    };
    assert!(matches!(device.create_graphics_pipeline(&unset), Err(GalError::Validation(_))));

    device.destroy_graphics_pipeline(parts.pipeline);
    device.destroy_blend_state(parts.blend);
    flush(&device);
    let stale = GraphicsPipelineDesc {
        shader: parts.shader,
        ..unset
    };
    assert!(matches!(
        device.create_graphics_pipeline(&stale),
        Err(GalError::InvalidHandle(ObjectKind::BlendState))
    ));
}

#[test]
fn test_shader_derives_its_layouts() {
    let (device, probe) = device();

    let shader = device.create_shader(&shader_desc()).expect("Should create shader");
    assert_eq!(device.object_count(ObjectKind::BindGroupLayout), 2);
    assert_eq!(device.object_count(ObjectKind::PipelineLayout), 1);

    let layout = device.shader_pipeline_layout(shader).expect("Should have a pipeline layout");
    assert_eq!(device.ref_count(layout), Some(1));
    let mapping = device.shader_binding_mapping(shader).expect("Should have a binding mapping");
    assert_eq!(mapping.len(), 3);

    device.destroy_shader(shader);
    flush(&device);
    assert_eq!(device.object_count(ObjectKind::BindGroupLayout), 0);
    assert_eq!(device.object_count(ObjectKind::PipelineLayout), 0);
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_shaders_share_identical_bind_group_layouts() {
    let (device, _probe) = device();

    let plain = ShaderDesc::default().with_stage(ShaderStage::Compute, &[7]);
    let other = ShaderDesc::default().with_stage(ShaderStage::Compute, &[8]);
    let a = device.create_shader(&plain).expect("Should create shader");
    let b = device.create_shader(&other).expect("Should create shader");

    assert_ne!(a, b);
    assert_eq!(device.object_count(ObjectKind::BindGroupLayout), 1);
    assert_eq!(device.shader_pipeline_layout(a), device.shader_pipeline_layout(b));
}

#[test]
fn test_failed_shader_releases_its_layouts() {
    let (device, probe) = device();
    probe.set_creation_fails(ObjectKind::Shader, true);

    let result = device.create_shader(&shader_desc());

    assert!(matches!(result, Err(GalError::Backend { kind: ObjectKind::Shader, .. })));
    assert_eq!(device.object_count(ObjectKind::Shader), 0);
    flush(&device);
    assert_eq!(device.object_count(ObjectKind::BindGroupLayout), 0);
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_backend_failure_is_reported() {
    let (device, probe) = device();
    probe.set_creation_fails(ObjectKind::BlendState, true);

    let result = device.create_blend_state(&BlendStateDesc::default());

    assert!(matches!(result, Err(GalError::Backend { kind: ObjectKind::BlendState, .. })));
    assert_eq!(device.object_count(ObjectKind::BlendState), 0);
}

#[test]
fn test_capacity_limit_per_family() {
    let (device, probe) = device_with(DeviceConfig::default().with_capacity_limits(2, 3));

    device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");
    device.create_blend_state(&BlendStateDesc::alpha_blended()).expect("Should create blend state");
    let third = BlendStateDesc {
        alpha_to_coverage: true,
        ..BlendStateDesc::default()
    };
    assert!(matches!(
        device.create_blend_state(&third),
        Err(GalError::CapacityExceeded { kind: ObjectKind::BlendState, limit: 2 })
    ));
    assert_eq!(probe.live(ObjectKind::BlendState), 2);

    for _ in 0..3 {
        device.create_buffer(&BufferDesc::vertex(16, 4, false), &[]).expect("Should create buffer");
    }
    assert!(matches!(
        device.create_buffer(&BufferDesc::vertex(16, 4, false), &[]),
        Err(GalError::CapacityExceeded { kind: ObjectKind::Buffer, limit: 3 })
    ));
    assert_eq!(probe.live(ObjectKind::Buffer), 3);
}

#[test]
fn test_double_destroy_of_owned_object_is_ignored() {
    let (device, probe) = device();

    let texture = device.create_texture(&sampled_texture(), &[]).expect("Should create texture");
    device.destroy_texture(texture);
    device.destroy_texture(texture);
    assert_eq!(device.dead_object_count(), 1);
    assert_eq!(device.ref_count(texture), Some(0));

    flush(&device);
    assert_eq!(probe.destroyed(ObjectKind::Texture), 1);
    assert_eq!(probe.unknown_destroys(), 0);
}

#[test]
fn test_destroyed_buffer_rejects_updates() {
    let (device, probe) = device();

    let buffer = device.create_buffer(&BufferDesc::vertex(16, 4, false), &[]).expect("Should create buffer");
    device.update_buffer(buffer, 16, &[0; 16]).expect("Should update buffer");
    assert!(device.update_buffer(buffer, 56, &[0; 16]).is_err());
    assert_eq!(probe.buffer_updates(), 1);

    device.destroy_buffer(buffer);
    assert!(matches!(
        device.update_buffer(buffer, 0, &[0; 4]),
        Err(GalError::InvalidHandle(ObjectKind::Buffer))
    ));
}

#[test]
fn test_view_cache_reference_counts() {
    let (device, _probe) = device();
    let texture = device.create_texture(&sampled_texture().with_mip_levels(4), &[]).expect("Should create texture");

    let default_view = device.default_resource_view(texture);
    assert_eq!(device.ref_count(default_view), Some(1));

    let same = device
        .create_resource_view(&ResourceViewDesc::Texture(TextureResourceViewDesc::new(texture)))
        .expect("Should create view");
    assert_eq!(same, default_view);
    assert_eq!(device.ref_count(same), Some(2));
    device.destroy_resource_view(same);
    assert_eq!(device.ref_count(default_view), Some(1));

    let top_mip = device
        .create_resource_view(&ResourceViewDesc::Texture(TextureResourceViewDesc {
            mip_levels: 1,
            ..TextureResourceViewDesc::new(texture)
        }))
        .expect("Should create view");
    assert_ne!(top_mip, default_view);
    assert_eq!(device.texture_view_count(texture), 2);

    device.destroy_resource_view(top_mip);
    assert_eq!(device.texture_view_count(texture), 1);
    assert!(device.is_pending_destruction(top_mip));
}

#[test]
fn test_texture_destroy_destroys_cached_views() {
    let (device, probe) = device();
    let texture = device
        .create_texture(&TextureDesc::render_target(256, 256, Format::Rgba8Unorm), &[])
        .expect("Should create texture");
    device
        .create_resource_view(&ResourceViewDesc::Texture(TextureResourceViewDesc {
            override_format: Format::Rgba8UnormSrgb,
            ..TextureResourceViewDesc::new(texture)
        }))
        .expect("Should create view");
    assert_eq!(device.texture_view_count(texture), 3);

    device.destroy_texture(texture);
    flush(&device);

    assert_eq!(device.object_count(ObjectKind::ResourceView), 0);
    assert_eq!(device.object_count(ObjectKind::RenderTargetView), 0);
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_cube_render_target_view_is_viewed_as_array() {
    let (device, _probe) = device();
    let cube = device
        .create_texture(
            &TextureDesc::render_target(128, 128, Format::Rgba8Unorm).with_type(TextureType::TextureCube, 1),
            &[],
        )
        .expect("Should create cube texture");

    let view = device.default_render_target_view(cube);
    let desc = device.render_target_view_desc(view).expect("Should have a render target view");
    assert_eq!(desc.override_view_type, Some(TextureType::Texture2DArray));
    assert_eq!(desc.slice_count, 1);
}

#[test]
fn test_proxy_texture_preconditions() {
    let (device, probe) = device();
    let flat = device.create_texture(&sampled_texture(), &[]).expect("Should create texture");
    let cube = device
        .create_texture(&sampled_texture().with_type(TextureType::TextureCube, 1), &[])
        .expect("Should create cube texture");

    assert!(matches!(device.create_proxy_texture(flat, 0), Err(GalError::Validation(_))));
    assert!(matches!(device.create_proxy_texture(cube, 6), Err(GalError::Validation(_))));

    let proxy = device.create_proxy_texture(cube, 3).expect("Should create proxy");
    let desc = device.texture_desc(proxy).expect("Should have a descriptor");
    assert_eq!(desc.texture_type, TextureType::Texture2DProxy);
    assert_eq!(device.proxy_parent(proxy), Some((cube, 3)));

    let target = device.default_render_target_view(proxy);
    let target_desc = device.render_target_view_desc(target).expect("Should have a render target view");
    assert_eq!((target_desc.first_slice, target_desc.slice_count), (3, 1));

    // Proxies borrow the parent's memory
    let before = device.memory_usage().textures;
    device.destroy_texture(proxy);
    flush(&device);
    assert_eq!(device.memory_usage().textures, before);
    assert_eq!(probe.live(ObjectKind::Texture), 2);
}

#[test]
fn test_wrapped_texture_keeps_foreign_object() {
    let (device, probe) = device();
    let desc = TextureDesc {
        existing_native_object: Some(9000),
        ..sampled_texture()
    };

    let texture = device.create_texture(&desc, &[]).expect("Should wrap texture");
    device.destroy_texture(texture);
    flush(&device);

    assert!(!device.contains(texture));
    assert_eq!(probe.unknown_destroys(), 0);
    assert_eq!(probe.destroyed(ObjectKind::Texture), 0);
}

#[test]
fn test_buffer_with_shader_access_gets_default_view() {
    let (device, probe) = device();

    let buffer = device.create_buffer(&BufferDesc::structured(16, 64), &[]).expect("Should create buffer");
    let view = device.default_buffer_resource_view(buffer);
    assert!(!view.is_invalid());
    assert_eq!(device.ref_count(view), Some(1));

    device.destroy_buffer(buffer);
    flush(&device);
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_readback_objects() {
    let (device, probe) = device();

    assert!(device.create_readback_buffer(&ReadbackBufferDesc { total_size: 0 }).is_err());
    let buffer = device
        .create_readback_buffer(&ReadbackBufferDesc { total_size: 1024 })
        .expect("Should create readback buffer");
    let texture = device
        .create_readback_texture(&ReadbackTextureDesc {
            width: 64,
            height: 64,
            ..ReadbackTextureDesc::default()
        })
        .expect("Should create readback texture");

    device.destroy_readback_buffer(buffer);
    device.destroy_readback_texture(texture);
    flush(&device);
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_back_buffer_belongs_to_swap_chain() {
    let (device, probe) = device();
    let swap_chain = device.create_swap_chain(&swap_chain_desc()).expect("Should create swap chain");
    let back_buffer = device.back_buffer_texture(swap_chain).expect("Should have a back buffer");

    device.destroy_texture(back_buffer);
    assert!(!device.is_pending_destruction(back_buffer));
    assert_eq!(device.dead_object_count(), 0);

    device.update_swap_chain(swap_chain, PresentMode::Immediate, Some((640, 480))).expect("Should resize");
    let resized = device.back_buffer_texture(swap_chain).expect("Should have a back buffer");
    assert_ne!(resized, back_buffer);
    assert_eq!(device.texture_desc(resized).map(|desc| desc.width), Some(640));
    assert!(device.is_pending_destruction(back_buffer));

    device.destroy_swap_chain(swap_chain);
    device.shutdown().expect("Should shut down cleanly");
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_frame_order_is_enforced() {
    let (device, probe) = device();
    let swap_chain = device.create_swap_chain(&swap_chain_desc()).expect("Should create swap chain");

    assert!(matches!(device.end_frame(), Err(GalError::FrameOrder(_))));
    device.enqueue_frame_swap_chain(swap_chain).expect("Should enqueue swap chain");
    device.begin_frame(1).expect("Should begin frame");
    assert!(device.is_in_frame());
    assert!(matches!(device.begin_frame(2), Err(GalError::FrameOrder(_))));
    assert!(matches!(device.enqueue_frame_swap_chain(swap_chain), Err(GalError::FrameOrder(_))));
    device.end_frame().expect("Should end frame");

    assert_eq!(probe.frames_ended(), 1);
    assert!(!device.is_in_frame());
}

#[test]
fn test_fences_signal_after_frame_end() {
    let (device, _probe) = device();

    let fence = device.signal_fence();
    assert_eq!(device.fence_result(fence, Duration::from_secs(60)), FenceResult::Timeout);
    flush(&device);
    assert_eq!(device.fence_result(fence, Duration::ZERO), FenceResult::Ready);

    device.flush();
    device.wait_idle();
}

#[test]
fn test_pipeline_cache_holds_one_reference() {
    let (device, probe) = device();
    let parts = create_pipeline(&device);
    let desc = GraphicsPipelineDesc {
        shader: parts.shader,
        vertex_declaration: VertexDeclarationHandle::invalid(),
        rasterizer_state: parts.rasterizer,
        blend_state: parts.blend,
        depth_stencil_state: parts.depth_stencil,
        topology: PrimitiveTopology::Triangles,
    };
    device.destroy_graphics_pipeline(parts.pipeline);

    let cached = device.cached_graphics_pipeline(&desc).expect("Should create pipeline");
    let again = device.cached_graphics_pipeline(&desc).expect("Should create pipeline");
    assert_eq!(cached, again);
    assert_eq!(device.ref_count(cached), Some(1));
    assert_eq!(device.pipeline_cache_len(), 1);

    device.destroy_shader(parts.shader);
    device.destroy_blend_state(parts.blend);
    device.destroy_rasterizer_state(parts.rasterizer);
    device.destroy_depth_stencil_state(parts.depth_stencil);
    device.shutdown().expect("Should release cached pipelines at shutdown");
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_pipeline_cache_revives_pipeline_destroyed_by_caller() {
    let (device, probe) = device();
    let parts = create_pipeline(&device);
    let desc = GraphicsPipelineDesc {
        shader: parts.shader,
        vertex_declaration: VertexDeclarationHandle::invalid(),
        rasterizer_state: parts.rasterizer,
        blend_state: parts.blend,
        depth_stencil_state: parts.depth_stencil,
        topology: PrimitiveTopology::Triangles,
    };
    device.destroy_graphics_pipeline(parts.pipeline);
    let cached = device.cached_graphics_pipeline(&desc).expect("Should create pipeline");

    // Releasing the cache's own reference queues the pipeline
    device.destroy_graphics_pipeline(cached);
    assert_eq!(device.ref_count(cached), Some(0));
    assert!(device.is_pending_destruction(cached));

    let again = device.cached_graphics_pipeline(&desc).expect("Should revive pipeline");
    assert_eq!(again, cached);
    assert_eq!(device.ref_count(cached), Some(1));
    assert!(!device.is_pending_destruction(cached));

    flush(&device);
    assert!(device.contains(cached));

    device.destroy_shader(parts.shader);
    device.destroy_blend_state(parts.blend);
    device.destroy_rasterizer_state(parts.rasterizer);
    device.destroy_depth_stencil_state(parts.depth_stencil);
    device.shutdown().expect("Should release cached pipelines at shutdown");
    assert_eq!(probe.live_total(), 0);
}

#[test]
fn test_dynamic_buffer_upload_and_swap() {
    let (device, probe) = device();
    let dynamic = device
        .create_dynamic_buffer(&DynamicBufferDesc::structured(16, 4))
        .expect("Should create dynamic buffer");

    let offset = device.allocate_dynamic(dynamic, 7, 2).expect("Should allocate");
    device
        .write_dynamic_elements(dynamic, offset, &[[1.0_f32; 4], [2.0; 4]])
        .expect("Should write");
    device.upload_dynamic_buffer(dynamic).expect("Should upload");
    assert_eq!(probe.created(ObjectKind::Buffer), 1);
    assert!(device.dynamic_rendering_buffer(dynamic).is_invalid());

    device.begin_frame(1).expect("Should begin frame");
    let rendering = device.dynamic_rendering_buffer(dynamic);
    assert!(!rendering.is_invalid());
    device.end_frame().expect("Should end frame");

    device.write_dynamic_elements(dynamic, offset, &[[3.0_f32; 4]]).expect("Should write");
    device.upload_dynamic_buffer(dynamic).expect("Should upload");
    assert_eq!(probe.buffer_updates(), 1);
    assert_eq!(probe.created(ObjectKind::Buffer), 1);

    // Growing past the capacity uploads into a new buffer
    device.allocate_dynamic(dynamic, 8, 100).expect("Should allocate");
    device.upload_dynamic_buffer(dynamic).expect("Should upload");
    assert_eq!(probe.created(ObjectKind::Buffer), 2);
    assert!(device.is_pending_destruction(rendering));

    device.destroy_dynamic_buffer(dynamic);
    device.shutdown().expect("Should shut down cleanly");
    assert_eq!(probe.live_total(), 0);
    assert_eq!(probe.unknown_destroys(), 0);
}

#[test]
fn test_dynamic_buffer_rejects_bad_descriptors() {
    let (device, _probe) = device();

    assert!(device.create_dynamic_buffer(&DynamicBufferDesc::structured(0, 4)).is_err());
    let odd = DynamicBufferDesc {
        total_size: 30,
        ..DynamicBufferDesc::structured(16, 1)
    };
    assert!(device.create_dynamic_buffer(&odd).is_err());
}

#[test]
fn test_shutdown_reports_leaks() {
    let (device, _probe) = device();

    device.create_buffer(&BufferDesc::vertex(16, 4, false), &[]).expect("Should create buffer");
    device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");

    assert!(matches!(device.shutdown(), Err(GalError::ResourcesLeaked { count: 2 })));
}

#[test]
fn test_statistics_snapshot() {
    let (device, _probe) = device();

    device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");
    device.create_buffer(&BufferDesc::vertex(16, 4, false), &[]).expect("Should create buffer");
    let statistics = device.statistics();

    assert!(statistics.live_objects.contains(&(ObjectKind::BlendState, 1)));
    assert_eq!(statistics.total_objects(), 2);
    assert_eq!(statistics.memory.buffers, 64);
    assert!(statistics.to_string().contains("live objects: 2"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = Device::new(
        Box::new(NullBackend::new()),
        DeviceConfig::default().with_capacity_limits(0, 16),
    );
    assert!(matches!(result, Err(GalError::Config(_))));
}
