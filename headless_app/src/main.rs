//! Headless demo application
//!
//! Drives a device and a render context on the null backend for a few frames:
//! a textured quad through a material, per-object constants and a compute
//! pass. Pass a `.toml` or `.ron` device configuration as the first argument
//! to override the defaults.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use gal_core::config::{Config, ConfigError};
use gal_core::foundation::logging;
use gal_core::prelude::*;

const QUAD_MATERIAL: MaterialId = MaterialId(1);
const QUAD_SHADER: ShaderId = ShaderId(1);
const PARTICLE_SHADER: ShaderId = ShaderId(2);
const FRAME_COUNT: u64 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    tint: [f32; 4],
    offset: [f32; 4],
}

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("Device error: {0}")]
    Gal(#[from] GalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Draw failed: {0}")]
    Apply(#[from] ApplyError),
}

/// Materials and permutations known up front
#[derive(Default)]
struct DemoResources {
    materials: HashMap<MaterialId, MaterialBindings>,
    permutations: HashMap<ShaderId, ShaderPermutation>,
}

impl ResourceProvider for DemoResources {
    fn resolve_material(&self, material: MaterialId) -> Option<MaterialBindings> {
        self.materials.get(&material).cloned()
    }

    fn resolve_permutation(&self, shader: ShaderId, vars: &PermutationVars) -> Option<ShaderPermutation> {
        log::trace!("Resolving shader {shader:?} with {vars:?}");
        self.permutations.get(&shader).copied()
    }
}

struct Scene {
    swap_chain: SwapChainHandle,
    shaders: [ShaderHandle; 2],
    blend_state: BlendStateHandle,
    rasterizer_state: RasterizerStateHandle,
    depth_stencil_state: DepthStencilStateHandle,
    texture: TextureHandle,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    mesh: MeshBufferBinding,
    resources: DemoResources,
}

fn load_config() -> Result<DeviceConfig, AppError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading device configuration from {path}");
            Ok(DeviceConfig::load_from_file(path)?)
        }
        None => Ok(DeviceConfig::new("headless")),
    }
}

fn create_scene(device: &Device) -> Result<Scene, AppError> {
    let swap_chain = device.create_swap_chain(&SwapChainDesc {
        window_id: 1,
        width: 1280,
        height: 720,
        back_buffer_format: Format::Rgba8Unorm,
        present_mode: PresentMode::VSync,
        allow_shader_resource_view: false,
    })?;

    let quad_shader = device.create_shader(
        &ShaderDesc::default()
            .with_stage(ShaderStage::Vertex, b"quad_vs")
            .with_stage(ShaderStage::Pixel, b"quad_ps")
            .with_vertex_inputs(vec![VertexSemantic::Position, VertexSemantic::Color0])
            .with_bindings(vec![
                ShaderResourceBinding::new("BaseTexture", ShaderResourceCategory::Texture, 0),
                ShaderResourceBinding::new("BaseSampler", ShaderResourceCategory::Sampler, 1),
                ShaderResourceBinding::new("GlobalConstants", ShaderResourceCategory::ConstantBuffer, 0)
                    .in_group(1)
                    .with_block_size(32),
                ShaderResourceBinding::new("PerObject", ShaderResourceCategory::ConstantBuffer, 1)
                    .in_group(1)
                    .with_block_size(32),
            ]),
    )?;
    let particle_shader = device.create_shader(&ShaderDesc::default().with_stage(ShaderStage::Compute, b"particles_cs"))?;

    let blend_state = device.create_blend_state(&BlendStateDesc::alpha_blended())?;
    let rasterizer_state = device.create_rasterizer_state(&RasterizerStateDesc::default())?;
    let depth_stencil_state = device.create_depth_stencil_state(&DepthStencilStateDesc::default())?;

    let texture = device.create_texture(
        &TextureDesc {
            immutable: false,
            ..TextureDesc::texture_2d(256, 256, Format::Rgba8Unorm)
        },
        &[],
    )?;

    let vertices = [
        Vertex { position: [-0.5, -0.5, 0.0], color: [1.0, 0.0, 0.0, 1.0] },
        Vertex { position: [0.5, -0.5, 0.0], color: [0.0, 1.0, 0.0, 1.0] },
        Vertex { position: [0.5, 0.5, 0.0], color: [0.0, 0.0, 1.0, 1.0] },
        Vertex { position: [-0.5, 0.5, 0.0], color: [1.0, 1.0, 1.0, 1.0] },
    ];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
    let vertex_size = std::mem::size_of::<Vertex>() as u32;
    let vertex_buffer = device.create_vertex_buffer(vertex_size, vertices.len() as u32, bytemuck::cast_slice(&vertices))?;
    let index_buffer = device.create_index_buffer(2, indices.len() as u32, bytemuck::cast_slice(&indices))?;

    let layout = VertexLayout::new(vec![
        VertexAttribute {
            semantic: VertexSemantic::Position,
            format: Format::Rgb32Float,
            offset: 0,
            vertex_buffer_slot: 0,
        },
        VertexAttribute {
            semantic: VertexSemantic::Color0,
            format: Format::Rgba32Float,
            offset: 12,
            vertex_buffer_slot: 0,
        },
    ]);
    let mesh = MeshBufferBinding::new(vertex_buffer, index_buffer, Arc::new(layout), PrimitiveTopology::Triangles, 2);

    let mut resources = DemoResources::default();
    resources.materials.insert(
        QUAD_MATERIAL,
        MaterialBindings {
            shader: Some(QUAD_SHADER),
            textures: vec![("BaseTexture".into(), texture)],
            ..MaterialBindings::default()
        },
    );
    let permutation = |shader| ShaderPermutation {
        shader,
        blend_state,
        rasterizer_state,
        depth_stencil_state,
    };
    resources.permutations.insert(QUAD_SHADER, permutation(quad_shader));
    resources.permutations.insert(PARTICLE_SHADER, permutation(particle_shader));

    Ok(Scene {
        swap_chain,
        shaders: [quad_shader, particle_shader],
        blend_state,
        rasterizer_state,
        depth_stencil_state,
        texture,
        vertex_buffer,
        index_buffer,
        mesh,
        resources,
    })
}

fn render_frames(device: &Arc<Device>, scene: &Scene, resources: DemoResources) -> Result<(), AppError> {
    let provider: Arc<dyn ResourceProvider> = Arc::new(resources);
    let mut context = RenderContext::new(Arc::clone(device), provider, NullEncoder::new())?;
    let per_object = context.create_constant_storage_for::<ObjectConstants>()?;
    let back_buffer = device.back_buffer_texture(scene.swap_chain);
    let (width, height) = device
        .swap_chain_desc(scene.swap_chain)
        .map_or((1, 1), |desc| (desc.width, desc.height));

    for frame in 0..FRAME_COUNT {
        device.enqueue_frame_swap_chain(scene.swap_chain)?;
        device.begin_frame(frame)?;

        let time = frame as f64 / 60.0;
        context.set_global_and_world_time(1.0 / 60.0, time, time);

        context.begin_rendering(
            Viewport {
                width: width as f32,
                height: height as f32,
            },
            MsaaSampleCount::None,
        );
        context.bind_material(QUAD_MATERIAL);
        context.bind_mesh_buffer(&scene.mesh);
        context.bind_constant_storage("PerObject", per_object);
        for instance in 0..2u8 {
            context.write_constants(
                per_object,
                &ObjectConstants {
                    tint: [1.0, 1.0, 1.0, 1.0],
                    offset: [f32::from(instance) * 0.5, 0.0, 0.0, 0.0],
                },
            )?;
            context.draw_mesh_buffer(u32::MAX, 0, 1)?;
        }
        context.end_rendering();

        context.begin_compute();
        context.bind_shader(PARTICLE_SHADER, ShaderBindFlags::empty());
        context.dispatch(64, 1, 1)?;
        context.end_compute();

        device.end_frame()?;

        let statistics = context.reset_statistics();
        log::info!(
            "Frame {frame}: {} commands, {} pipeline changes, {} constant uploads, {} failed draws",
            context.encoder().calls().len(),
            statistics.pipeline_changes,
            statistics.constant_uploads,
            statistics.failed_drawcalls
        );
        context.encoder_mut().clear();
    }

    log::info!(
        "Back buffer {:?}, {} cached vertex declarations, {} cache hits",
        back_buffer,
        context.cached_vertex_declarations(),
        context.vertex_declaration_cache_hits()
    );
    Ok(())
}

fn run() -> Result<(), AppError> {
    let config = load_config()?;
    let device = Device::new_shared(Box::new(NullBackend::new()), config)?;
    log::info!("Device capabilities: {:?}", device.capabilities());

    let mut scene = create_scene(&device)?;
    let resources = std::mem::take(&mut scene.resources);
    render_frames(&device, &scene, resources)?;
    release_scene(&device, &scene);

    device.begin_frame(FRAME_COUNT)?;
    device.end_frame()?;
    log::info!("Device statistics:\n{}", device.statistics());

    device.shutdown()?;
    Ok(())
}

fn release_scene(device: &Device, scene: &Scene) {
    device.destroy_buffer(scene.vertex_buffer);
    device.destroy_buffer(scene.index_buffer);
    device.destroy_texture(scene.texture);
    for shader in scene.shaders {
        device.destroy_shader(shader);
    }
    device.destroy_blend_state(scene.blend_state);
    device.destroy_rasterizer_state(scene.rasterizer_state);
    device.destroy_depth_stencil_state(scene.depth_stencil_state);
    device.destroy_swap_chain(scene.swap_chain);
}

fn main() {
    if std::env::var_os("RUST_LOG").is_some() {
        logging::init();
    } else {
        logging::init_with_filter("info");
    }

    if let Err(err) = run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
