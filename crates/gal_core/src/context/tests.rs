//! Render context scenarios against the null backend and a scripted provider

use std::collections::HashMap;

use parking_lot::Mutex;

use super::*;
use crate::backend::{EncoderCall, NullBackend, NullEncoder};
use crate::config::DeviceConfig;
use crate::descriptors::{
    BlendStateDesc, BufferDesc, DepthStencilStateDesc, Format, RasterizerStateDesc, ShaderDesc, ShaderStage,
    TextureDesc, VertexAttribute, VertexSemantic,
};
use crate::handles::ObjectKind;

const BASE_SHADER: ShaderId = ShaderId(1);
const DETAIL_SHADER: ShaderId = ShaderId(2);
const COMPUTE_SHADER: ShaderId = ShaderId(3);

#[derive(Default)]
struct ScriptedProvider {
    materials: Mutex<HashMap<MaterialId, MaterialBindings>>,
    permutations: Mutex<HashMap<ShaderId, ShaderPermutation>>,
    last_vars: Mutex<PermutationVars>,
}

impl ResourceProvider for ScriptedProvider {
    fn resolve_material(&self, material: MaterialId) -> Option<MaterialBindings> {
        self.materials.lock().get(&material).cloned()
    }

    fn resolve_permutation(&self, shader: ShaderId, vars: &PermutationVars) -> Option<ShaderPermutation> {
        self.last_vars.lock().clone_from(vars);
        self.permutations.lock().get(&shader).copied()
    }
}

struct Fixture {
    device: Arc<Device>,
    provider: Arc<ScriptedProvider>,
    blend: BlendStateHandle,
    rasterizer: RasterizerStateHandle,
    depth_stencil: DepthStencilStateHandle,
}

impl Fixture {
    fn new() -> Self {
        crate::foundation::logging::init_for_tests();
        let device =
            Device::new_shared(Box::new(NullBackend::new()), DeviceConfig::default()).expect("Should create device");
        let blend = device.create_blend_state(&BlendStateDesc::default()).expect("Should create blend state");
        let rasterizer = device
            .create_rasterizer_state(&RasterizerStateDesc::default())
            .expect("Should create rasterizer state");
        let depth_stencil = device
            .create_depth_stencil_state(&DepthStencilStateDesc::default())
            .expect("Should create depth-stencil state");

        let fixture = Self {
            device,
            provider: Arc::new(ScriptedProvider::default()),
            blend,
            rasterizer,
            depth_stencil,
        };
        fixture.register_shader(
            BASE_SHADER,
            &graphics_shader(vec![
                ShaderResourceBinding::new("BaseTexture", ShaderResourceCategory::Texture, 0),
                ShaderResourceBinding::new("BaseSampler", ShaderResourceCategory::Sampler, 1),
                ShaderResourceBinding::new(GLOBAL_CONSTANTS_SLOT, ShaderResourceCategory::ConstantBuffer, 0)
                    .in_group(1)
                    .with_block_size(32),
            ]),
        );
        fixture.register_shader(
            DETAIL_SHADER,
            &graphics_shader(vec![ShaderResourceBinding::new(
                "DetailTexture",
                ShaderResourceCategory::Texture,
                0,
            )]),
        );
        fixture.register_shader(
            COMPUTE_SHADER,
            &ShaderDesc::default().with_stage(ShaderStage::Compute, &[9, 9, 9]),
        );
        fixture
    }

    fn register_shader(&self, id: ShaderId, desc: &ShaderDesc) -> ShaderHandle {
        let shader = self.device.create_shader(desc).expect("Should create shader");
        self.provider.permutations.lock().insert(
            id,
            ShaderPermutation {
                shader,
                blend_state: self.blend,
                rasterizer_state: self.rasterizer,
                depth_stencil_state: self.depth_stencil,
            },
        );
        shader
    }

    fn context(&self) -> RenderContext<NullEncoder> {
        let provider: Arc<dyn ResourceProvider> = self.provider.clone();
        RenderContext::new(Arc::clone(&self.device), provider, NullEncoder::new()).expect("Should create context")
    }

    fn texture(&self) -> TextureHandle {
        let desc = TextureDesc {
            immutable: false,
            ..TextureDesc::texture_2d(16, 16, Format::Rgba8Unorm)
        };
        self.device.create_texture(&desc, &[]).expect("Should create texture")
    }

    fn triangle_mesh(&self, indexed: bool, primitive_count: u32) -> MeshBufferBinding {
        let vertex_count = primitive_count * 3;
        let vertex_buffer = self
            .device
            .create_vertex_buffer(12, vertex_count, &vec![0; vertex_count as usize * 12])
            .expect("Should create vertex buffer");
        let index_buffer = if indexed {
            self.device
                .create_index_buffer(2, vertex_count, &vec![0; vertex_count as usize * 2])
                .expect("Should create index buffer")
        } else {
            BufferHandle::invalid()
        };
        MeshBufferBinding::new(
            vertex_buffer,
            index_buffer,
            Arc::new(position_layout()),
            PrimitiveTopology::Triangles,
            primitive_count,
        )
    }
}

fn graphics_shader(bindings: Vec<ShaderResourceBinding>) -> ShaderDesc {
    ShaderDesc::default()
        .with_stage(ShaderStage::Vertex, &[1, 2, 3])
        .with_stage(ShaderStage::Pixel, &[4, 5, 6])
        .with_vertex_inputs(vec![VertexSemantic::Position])
        .with_bindings(bindings)
}

fn position_layout() -> VertexLayout {
    VertexLayout::new(vec![VertexAttribute {
        semantic: VertexSemantic::Position,
        format: Format::Rgb32Float,
        offset: 0,
        vertex_buffer_slot: 0,
    }])
}

fn viewport() -> Viewport {
    Viewport {
        width: 1280.0,
        height: 720.0,
    }
}

#[test]
fn test_apply_without_shader_records_nothing() {
    let fixture = Fixture::new();
    let mut context = fixture.context();

    context.reset_context_state();
    context.begin_rendering(viewport(), MsaaSampleCount::None);

    assert!(matches!(context.apply_context_states(false), Err(ApplyError::NoActiveShader)));
    assert!(context.encoder().calls().is_empty());
    assert!(context.state_flags().contains(StateFlags::SHADER_STATE_CHANGED));
}

#[test]
fn test_apply_outside_scope_is_rejected() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());

    assert!(matches!(context.apply_context_states(false), Err(ApplyError::NoScope)));
    assert!(context.encoder().calls().is_empty());
}

#[test]
fn test_reset_marks_everything_but_material_dirty() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    context.bind_material(MaterialId(7));

    context.reset_context_state();

    assert_eq!(context.state_flags(), StateFlags::ALL_STATES_INVALID);
    assert!(!context.state_flags().contains(StateFlags::MATERIAL_BINDING_CHANGED));
}

#[test]
fn test_unchanged_state_is_not_reapplied() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    let texture = fixture.texture();
    let mesh = fixture.triangle_mesh(true, 1);

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.bind_mesh_buffer(&mesh);
    context.bind_texture("BaseTexture", texture);
    context.apply_context_states(false).expect("Should apply state");

    assert!(context.state_flags().is_empty());
    assert_eq!(context.encoder().pipeline_sets(), 1);
    assert_eq!(context.encoder().resource_view_slots(), vec!["BaseTexture"]);

    // Rebinding identical values must not raise any flag.
    context.encoder_mut().clear();
    context.bind_texture("BaseTexture", texture);
    context.bind_mesh_buffer(&mesh);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.set_blend_state(fixture.blend);
    assert!(context.state_flags().is_empty());

    context.apply_context_states(false).expect("Should apply state");
    assert!(context.encoder().calls().is_empty());
}

#[test]
fn test_force_rebind_reapplies_shader() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));
    context.apply_context_states(false).expect("Should apply state");

    context.bind_shader(BASE_SHADER, ShaderBindFlags::FORCE_REBIND);
    assert!(context.state_flags().contains(StateFlags::SHADER_STATE_CHANGED));
}

#[test]
fn test_bind_shader_drops_material() {
    let fixture = Fixture::new();
    let mut context = fixture.context();

    context.bind_material(MaterialId(1));
    assert!(context.state_flags().contains(StateFlags::MATERIAL_BINDING_CHANGED));

    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    assert!(!context.state_flags().contains(StateFlags::MATERIAL_BINDING_CHANGED));
}

#[test]
fn test_material_swap_only_warns_for_required_slots() {
    let fixture = Fixture::new();
    let texture = fixture.texture();
    {
        let mut materials = fixture.provider.materials.lock();
        materials.insert(
            MaterialId(1),
            MaterialBindings {
                shader: Some(BASE_SHADER),
                textures: vec![("BaseTexture".into(), texture)],
                ..MaterialBindings::default()
            },
        );
        materials.insert(
            MaterialId(2),
            MaterialBindings {
                shader: Some(DETAIL_SHADER),
                ..MaterialBindings::default()
            },
        );
    }

    let mut context = fixture.context();
    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));

    context.bind_material(MaterialId(1));
    context.apply_context_states(false).expect("Should apply first material");
    assert_eq!(context.statistics().missing_bindings, 0);

    context.encoder_mut().clear();
    context.bind_material(MaterialId(2));
    context.apply_context_states(false).expect("Should apply second material");

    // The stale BaseTexture binding is not part of the detail shader's layout.
    assert_eq!(context.statistics().missing_bindings, 1);
    assert!(context.encoder().resource_view_slots().is_empty());
    assert_eq!(context.active_gal_shader(), fixture.provider.permutations.lock()[&DETAIL_SHADER].shader);
}

#[test]
fn test_unresolved_permutation_keeps_shader_dirty() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    let late_shader = ShaderId(42);

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));
    context.bind_shader(late_shader, ShaderBindFlags::empty());

    assert!(matches!(
        context.apply_context_states(false),
        Err(ApplyError::PermutationNotReady)
    ));
    assert!(context.state_flags().contains(StateFlags::SHADER_STATE_CHANGED));
    assert!(context.active_gal_shader().is_invalid());

    let shader = fixture.register_shader(late_shader, &graphics_shader(Vec::new()));
    context.apply_context_states(false).expect("Should apply once the shader loaded");
    assert_eq!(context.active_gal_shader(), shader);
}

#[test]
fn test_scope_sets_permutation_variables_and_constants() {
    let fixture = Fixture::new();
    let mut context = fixture.context();

    context.begin_rendering(viewport(), MsaaSampleCount::Four);
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.apply_context_states(false).expect("Should apply state");

    assert_eq!(context.permutation_variable(MSAA_PERMUTATION), Some("TRUE"));
    assert_eq!(context.permutation_variable(TOPOLOGY_PERMUTATION), Some("TOPOLOGY_TRIANGLES"));
    assert_eq!(
        fixture.provider.last_vars.lock().get(MSAA_PERMUTATION).map(String::as_str),
        Some("TRUE")
    );

    let constants = context.global_constants();
    assert_eq!(constants.msaa_samples, 4);
    assert_eq!(constants.viewport_size, [1280.0, 720.0, 1.0 / 1280.0, 1.0 / 720.0]);
}

#[test]
fn test_global_time_wraps() {
    let fixture = Fixture::new();
    let mut context = fixture.context();

    context.set_global_and_world_time(0.016, 1500.5, 20.0);

    let constants = context.global_constants();
    assert!((constants.delta_time - 0.016).abs() < f32::EPSILON);
    assert!((constants.global_time - 500.5).abs() < 1e-3);
    assert!((constants.world_time - 20.0).abs() < f32::EPSILON);
}

#[test]
fn test_constant_storages_upload_when_modified() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    let storage = context.create_constant_storage_for::<[f32; 8]>().expect("Should create storage");

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.bind_constant_storage("PerObject", storage);
    context.apply_context_states(false).expect("Should apply state");

    // Global constants and the new storage.
    assert_eq!(context.statistics().constant_uploads, 2);
    let global_buffer = context
        .constant_storage_buffer(context.global_constants_storage())
        .expect("Should have a buffer");
    assert!(context.encoder().calls().contains(&EncoderCall::SetConstantBuffer {
        name: GLOBAL_CONSTANTS_SLOT.into(),
        buffer: global_buffer,
    }));

    context.encoder_mut().clear();
    context.write_constants(storage, &[1.0f32; 8]).expect("Should write constants");
    context.apply_context_states(false).expect("Should apply state");

    let storage_buffer = context.constant_storage_buffer(storage).expect("Should have a buffer");
    assert_eq!(
        context.encoder().calls(),
        &[EncoderCall::UpdateBuffer {
            buffer: storage_buffer,
            offset: 0,
            size: 32
        }]
    );
    assert_eq!(context.constant_storage_data(storage).map(<[u8]>::len), Some(32));
}

#[test]
fn test_deleted_constant_storage_is_reused() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    let buffers_before = fixture.device.object_count(ObjectKind::Buffer);

    let first = context.create_constant_storage(64).expect("Should create storage");
    let buffer = context.constant_storage_buffer(first);
    assert!(context.delete_constant_storage(first));
    assert_eq!(context.pooled_constant_storages(64), 1);

    let second = context.create_constant_storage(64).expect("Should create storage");
    assert_eq!(context.constant_storage_buffer(second), buffer);
    assert_eq!(fixture.device.object_count(ObjectKind::Buffer), buffers_before + 1);

    assert!(!context.delete_constant_storage(context.global_constants_storage()));
    assert!(context.create_constant_storage(20).is_err());
}

#[test]
fn test_vertex_declarations_are_cached() {
    let fixture = Fixture::new();
    let mut context = fixture.context();

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));
    context.apply_context_states(false).expect("Should apply first mesh");

    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 2));
    context.apply_context_states(false).expect("Should apply second mesh");

    assert_eq!(context.cached_vertex_declarations(), 1);
    assert_eq!(context.vertex_declaration_cache_hits(), 1);
}

#[test]
fn test_mismatched_vertex_layout_fails_and_is_cached() {
    let fixture = Fixture::new();
    let normal_shader = ShaderId(10);
    fixture.register_shader(
        normal_shader,
        &graphics_shader(Vec::new()).with_vertex_inputs(vec![VertexSemantic::Position, VertexSemantic::Normal]),
    );
    let mut context = fixture.context();

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(normal_shader, ShaderBindFlags::empty());
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));

    for _ in 0..2 {
        assert!(matches!(
            context.apply_context_states(false),
            Err(ApplyError::VertexDeclarationUnavailable)
        ));
    }
    assert_eq!(context.cached_vertex_declarations(), 1);
    assert_eq!(context.vertex_declaration_cache_hits(), 1);
    assert!(context.state_flags().contains(StateFlags::MESH_BUFFER_BINDING_CHANGED));
}

#[test]
fn test_failed_draws_are_counted() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_mesh_buffer(&fixture.triangle_mesh(true, 2));

    assert!(matches!(context.draw_mesh_buffer(1, 0, 1), Err(ApplyError::NoActiveShader)));

    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    assert!(matches!(context.draw_mesh_buffer(0, 0, 1), Err(ApplyError::EmptyDraw)));
    assert!(matches!(
        context.draw_mesh_buffer(1, 2, 1),
        Err(ApplyError::InvalidDrawRange { first: 2, available: 2 })
    ));

    assert_eq!(context.statistics().failed_drawcalls, 3);
    assert_eq!(context.reset_statistics().failed_drawcalls, 3);
    assert_eq!(context.statistics(), ContextStatistics::default());
}

#[test]
fn test_draw_past_the_index_range_fails_cleanly() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());

    let mesh = MeshBufferBinding {
        primitive_count: 2_000_000_000,
        ..fixture.triangle_mesh(true, 1)
    };
    context.bind_mesh_buffer(&mesh);

    assert!(matches!(
        context.draw_mesh_buffer(2_000_000_000, 0, 1),
        Err(ApplyError::IndexRangeOverflow {
            first: 0,
            primitives: 2_000_000_000
        })
    ));
    assert!(matches!(
        context.draw_mesh_buffer(1, 1_500_000_000, 1),
        Err(ApplyError::IndexRangeOverflow { first: 1_500_000_000, .. })
    ));
    assert_eq!(context.statistics().failed_drawcalls, 2);

    // Counts that still fit are drawn
    context.draw_mesh_buffer(1_000_000_000, 0, 1).expect("Should draw");
    assert!(context.encoder().calls().contains(&EncoderCall::DrawIndexed {
        index_count: 3_000_000_000,
        first_index: 0
    }));
}

#[test]
fn test_draw_variants() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());

    context.bind_mesh_buffer(&fixture.triangle_mesh(true, 2));
    context.draw_mesh_buffer(10, 1, 1).expect("Should draw indexed");
    context.draw_mesh_buffer(2, 0, 4).expect("Should draw indexed instanced");

    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 2));
    context.draw_mesh_buffer(u32::MAX, 0, 1).expect("Should draw");
    context.draw_mesh_buffer(1, 0, 2).expect("Should draw instanced");

    let draws: Vec<_> = context
        .encoder()
        .calls()
        .iter()
        .filter(|call| {
            matches!(
                call,
                EncoderCall::Draw { .. }
                    | EncoderCall::DrawIndexed { .. }
                    | EncoderCall::DrawInstanced { .. }
                    | EncoderCall::DrawIndexedInstanced { .. }
            )
        })
        .cloned()
        .collect();
    assert_eq!(
        draws,
        vec![
            EncoderCall::DrawIndexed {
                index_count: 3,
                first_index: 3
            },
            EncoderCall::DrawIndexedInstanced {
                index_count: 6,
                instance_count: 4,
                first_index: 0
            },
            EncoderCall::Draw {
                vertex_count: 6,
                first_vertex: 0
            },
            EncoderCall::DrawInstanced {
                vertex_count: 3,
                instance_count: 2,
                first_vertex: 0
            },
        ]
    );
    assert_eq!(context.statistics().failed_drawcalls, 0);
}

#[test]
fn test_mesh_change_binds_all_vertex_streams() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    let mesh = fixture.triangle_mesh(true, 1);

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.bind_mesh_buffer(&mesh);
    context.apply_context_states(false).expect("Should apply state");

    let calls = context.encoder().calls();
    assert_eq!(calls.iter().filter(|call| matches!(call, EncoderCall::SetVertexBuffer { .. })).count(), 4);
    assert!(calls.contains(&EncoderCall::SetVertexBuffer {
        slot: 0,
        buffer: mesh.vertex_buffers[0],
        offset: 0
    }));
    assert!(calls.contains(&EncoderCall::SetIndexBuffer(mesh.index_buffer)));
}

#[test]
fn test_instance_stream_changes_declaration() {
    let fixture = Fixture::new();
    let mut context = fixture.context();
    let instances = fixture
        .device
        .create_buffer(&BufferDesc::vertex(16, 8, false), &[])
        .expect("Should create instance buffer");

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));
    context.apply_context_states(false).expect("Should apply state");

    context.bind_vertex_buffer(1, instances, VertexBindingRate::Instance, 0);
    context.bind_vertex_buffer(MAX_CONTEXT_VERTEX_BUFFERS, instances, VertexBindingRate::Instance, 0);
    assert!(context.state_flags().contains(StateFlags::MESH_BUFFER_BINDING_CHANGED));

    context.apply_context_states(false).expect("Should apply state");
    // Slot 1 is not read by the layout, the declaration is shared.
    assert_eq!(context.cached_vertex_declarations(), 1);
}

#[test]
fn test_unbound_sampler_falls_back_to_default() {
    let fixture = Fixture::new();
    let mut context = fixture.context();

    context.begin_rendering(viewport(), MsaaSampleCount::None);
    context.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    context.bind_mesh_buffer(&fixture.triangle_mesh(false, 1));
    context.apply_context_states(false).expect("Should apply state");

    let default_sampler = context
        .default_sampler(DefaultSamplerFlags::LINEAR_FILTERING)
        .expect("Should create default sampler");
    assert!(context.encoder().calls().contains(&EncoderCall::SetSamplerState {
        name: "BaseSampler".into(),
        sampler: default_sampler,
    }));
    // BaseTexture is the only slot left empty.
    assert_eq!(context.statistics().missing_bindings, 1);
}

#[test]
fn test_shader_bind_flags_keep_overridden_states() {
    let fixture = Fixture::new();
    let alpha_blend = fixture
        .device
        .create_blend_state(&BlendStateDesc::alpha_blended())
        .expect("Should create blend state");
    let mesh = fixture.triangle_mesh(false, 1);

    let mut overridden = fixture.context();
    overridden.begin_rendering(viewport(), MsaaSampleCount::None);
    overridden.set_blend_state(alpha_blend);
    overridden.bind_shader(BASE_SHADER, ShaderBindFlags::NO_BLEND_STATE);
    overridden.bind_mesh_buffer(&mesh);
    overridden.apply_context_states(false).expect("Should apply state");

    let mut replaced = fixture.context();
    replaced.begin_rendering(viewport(), MsaaSampleCount::None);
    replaced.set_blend_state(alpha_blend);
    replaced.bind_shader(BASE_SHADER, ShaderBindFlags::empty());
    replaced.bind_mesh_buffer(&mesh);
    replaced.apply_context_states(false).expect("Should apply state");

    let pipeline = |context: &RenderContext<NullEncoder>| {
        context.encoder().calls().iter().find_map(|call| match call {
            EncoderCall::SetGraphicsPipeline(pipeline) => Some(*pipeline),
            _ => None,
        })
    };
    assert!(pipeline(&overridden).is_some());
    assert_ne!(pipeline(&overridden), pipeline(&replaced));
}

#[test]
fn test_compute_dispatch() {
    let fixture = Fixture::new();
    let mut context = fixture.context();

    context.bind_shader(COMPUTE_SHADER, ShaderBindFlags::empty());
    assert!(matches!(context.dispatch(1, 1, 1), Err(ApplyError::NoScope)));

    context.begin_compute();
    context.begin_rendering(viewport(), MsaaSampleCount::None);
    assert!(context.is_compute());
    assert!(!context.is_rendering());

    context.dispatch(8, 8, 1).expect("Should dispatch");
    context.end_compute();

    let calls = context.encoder().calls();
    assert!(calls.iter().any(|call| matches!(call, EncoderCall::SetComputePipeline(_))));
    assert_eq!(calls.last(), Some(&EncoderCall::Dispatch { x: 8, y: 8, z: 1 }));
    assert_eq!(context.statistics().failed_drawcalls, 1);
}

#[test]
fn test_drop_releases_context_objects() {
    let fixture = Fixture::new();
    let buffers_before = fixture.device.object_count(ObjectKind::Buffer);
    {
        let mut context = fixture.context();
        context.create_constant_storage(16).expect("Should create storage");
        context
            .default_sampler(DefaultSamplerFlags::CLAMP)
            .expect("Should create default sampler");
        assert_eq!(fixture.device.object_count(ObjectKind::Buffer), buffers_before + 2);
    }

    fixture.device.begin_frame(0).expect("Should begin frame");
    fixture.device.end_frame().expect("Should end frame");

    assert_eq!(fixture.device.object_count(ObjectKind::Buffer), buffers_before);
    assert_eq!(fixture.device.object_count(ObjectKind::SamplerState), 0);
}
