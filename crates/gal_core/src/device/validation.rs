//! Platform-independent descriptor checks
//!
//! Every check runs before the backend sees a descriptor. A failed check is
//! logged at error level and returned as [`GalError::Validation`].

use crate::backend::DeviceCapabilities;
use crate::descriptors::{
    BufferDesc, BufferResourceViewDesc, BufferUnorderedAccessViewDesc, BufferUsageFlags, Format, MsaaSampleCount,
    RenderTargetViewDesc, ShaderDesc, ShaderResourceCategory, TextureDesc, TextureResourceViewDesc, TextureType,
    TextureUnorderedAccessViewDesc, VertexDeclarationDesc, MAX_BIND_GROUPS, MAX_VERTEX_BUFFERS,
};
use crate::error::{GalError, GalResult};

fn reject(message: impl Into<String>) -> GalResult<()> {
    Err(GalError::validation(message))
}

pub(crate) fn validate_buffer(desc: &BufferDesc, initial_data: &[u8], capabilities: &DeviceCapabilities) -> GalResult<()> {
    let usage = desc.usage;

    if desc.total_size == 0 {
        return reject("Trying to create a buffer with size of 0 is not possible");
    }
    if desc.immutable && initial_data.is_empty() {
        return reject("Trying to create an immutable buffer without initial data is not possible");
    }
    if !initial_data.is_empty() && initial_data.len() != desc.total_size as usize {
        return reject(format!(
            "Buffer initial data is {} bytes but the buffer is {} bytes",
            initial_data.len(),
            desc.total_size
        ));
    }
    if usage.contains(BufferUsageFlags::TRANSIENT) && !initial_data.is_empty() {
        return reject("Transient buffers cannot have initial data");
    }
    if usage.contains(BufferUsageFlags::INDEX_BUFFER) && desc.struct_size != 2 && desc.struct_size != 4 {
        return reject(format!("Index buffer struct size must be 2 or 4 but {} is set", desc.struct_size));
    }

    let texel = usage.contains(BufferUsageFlags::TEXEL_BUFFER);
    if texel && desc.format == Format::Unknown {
        return reject("Texel buffers must have a format");
    }
    if !texel && desc.format != Format::Unknown {
        return reject("A buffer format is only allowed on texel buffers");
    }
    if texel && desc.total_size % desc.format.size_in_bytes() != 0 {
        return reject(format!(
            "Texel buffer with format {:?} must have a size multiple of {}, but size is {}",
            desc.format,
            desc.format.size_in_bytes(),
            desc.total_size
        ));
    }

    let element_usage =
        BufferUsageFlags::STRUCTURED_BUFFER | BufferUsageFlags::VERTEX_BUFFER | BufferUsageFlags::INDEX_BUFFER;
    if usage.intersects(element_usage) && desc.struct_size == 0 {
        return reject("Struct size must be set for structured, vertex and index buffers");
    }
    if usage.contains(BufferUsageFlags::STRUCTURED_BUFFER) && desc.total_size % desc.struct_size != 0 {
        return reject(format!(
            "Structured buffer must have a size multiple of {}, but size is {}",
            desc.struct_size, desc.total_size
        ));
    }
    if texel && !capabilities.supports_texel_buffers {
        return reject("Texel buffers are not supported by this backend");
    }

    Ok(())
}

pub(crate) fn validate_texture(desc: &TextureDesc, initial_data_count: usize) -> GalResult<()> {
    if desc.immutable && initial_data_count < desc.mip_levels.max(1) as usize && !desc.allow_render_target_view {
        return reject("Trying to create an immutable texture without data for every mip level is not possible");
    }
    validate_texture_extent(desc)
}

pub(crate) fn validate_texture_extent(desc: &TextureDesc) -> GalResult<()> {
    if desc.width == 0 || desc.height == 0 {
        return reject("Trying to create a texture with width or height of 0 is not possible");
    }
    if !desc.texture_type.is_array() && desc.array_size != 1 {
        return reject(format!("Array size must be 1 for {:?} textures", desc.texture_type));
    }
    Ok(())
}

pub(crate) fn validate_shared_texture(desc: &TextureDesc, initial_data_count: Option<usize>) -> GalResult<()> {
    if desc.texture_type != TextureType::Texture2DShared {
        return reject("Shared textures must use the Texture2DShared type");
    }
    if desc.existing_native_object.is_some() {
        return reject("Shared textures cannot wrap an existing native object");
    }
    match initial_data_count {
        Some(count) => validate_texture(desc, count),
        None => validate_texture_extent(desc),
    }
}

pub(crate) fn validate_proxy_parent(parent: &TextureDesc, slice: u32) -> GalResult<()> {
    let slice_count = match parent.texture_type {
        TextureType::TextureCube => 6,
        TextureType::TextureCubeArray => 6 * parent.array_size,
        TextureType::Texture2DArray => parent.array_size,
        other => return reject(format!("Proxy textures need a cube or array parent, not {other:?}")),
    };
    if slice >= slice_count {
        return reject(format!("Proxy slice {slice} is out of range for a parent with {slice_count} slices"));
    }
    Ok(())
}

pub(crate) fn validate_texture_resource_view(texture: &TextureDesc, desc: &TextureResourceViewDesc) -> GalResult<()> {
    let view_type = desc.override_view_type.unwrap_or(texture.texture_type);
    if !view_type.is_array() && desc.array_size != 1 {
        return reject(format!("Resource view array size must be 1 for {view_type:?} views"));
    }
    Ok(())
}

pub(crate) fn validate_render_target_view(texture: &TextureDesc, desc: &RenderTargetViewDesc) -> GalResult<()> {
    let view_type = desc.override_view_type.unwrap_or(texture.texture_type);
    if view_type.is_cube() {
        return reject("Render target views cannot view a texture as a cube, use Texture2DArray instead");
    }
    if !view_type.is_array() && desc.slice_count != 1 {
        return reject(format!("Render target view slice count must be 1 for {view_type:?} views"));
    }
    Ok(())
}

pub(crate) fn validate_texture_unordered_access_view(
    texture: &TextureDesc,
    desc: &TextureUnorderedAccessViewDesc,
) -> GalResult<()> {
    if texture.sample_count != MsaaSampleCount::None {
        return reject("Unordered access views of multisampled textures are not supported");
    }
    let view_type = desc.override_view_type.unwrap_or(texture.texture_type);
    if view_type.is_cube() {
        return reject("Unordered access views cannot view a texture as a cube");
    }
    if !view_type.is_array() && desc.array_size != 1 {
        return reject(format!("Unordered access view array size must be 1 for {view_type:?} views"));
    }
    Ok(())
}

fn buffer_element_size(buffer: &BufferDesc, override_format: Format) -> u32 {
    if override_format != Format::Unknown {
        override_format.size_in_bytes()
    } else if buffer.format != Format::Unknown {
        buffer.format.size_in_bytes()
    } else if buffer.struct_size > 0 {
        buffer.struct_size
    } else {
        4
    }
}

/// Number of elements a view over the whole buffer covers
pub(crate) fn buffer_element_count(buffer: &BufferDesc, override_format: Format) -> u32 {
    buffer.total_size / buffer_element_size(buffer, override_format)
}

fn validate_buffer_range(buffer: &BufferDesc, override_format: Format, first: u32, count: u32) -> GalResult<()> {
    let available = buffer_element_count(buffer, override_format);
    if count == 0 || first.checked_add(count).map_or(true, |end| end > available) {
        return reject(format!(
            "Buffer view range {first}..{} exceeds the {available} elements of the buffer",
            first.saturating_add(count)
        ));
    }
    Ok(())
}

pub(crate) fn validate_buffer_resource_view(buffer: &BufferDesc, desc: &BufferResourceViewDesc) -> GalResult<()> {
    if !buffer.allows_shader_resource_view() {
        return reject("Buffer does not allow shader resource views");
    }
    validate_buffer_range(buffer, desc.override_format, desc.first_element, desc.element_count)
}

pub(crate) fn validate_buffer_unordered_access_view(
    buffer: &BufferDesc,
    desc: &BufferUnorderedAccessViewDesc,
) -> GalResult<()> {
    if !buffer.usage.contains(BufferUsageFlags::UNORDERED_ACCESS) {
        return reject("Buffer does not allow unordered access views");
    }
    if desc.raw && !buffer.usage.contains(BufferUsageFlags::BYTE_ADDRESS_BUFFER) {
        return reject("Raw unordered access views need a byte address buffer");
    }
    validate_buffer_range(buffer, desc.override_format, desc.first_element, desc.element_count)
}

pub(crate) fn validate_shader(desc: &ShaderDesc) -> GalResult<()> {
    if !desc.has_any_byte_code() {
        return reject("Can't create a shader which supplies no byte code at all");
    }
    if let Some(binding) = desc
        .binding_mapping
        .iter()
        .find(|binding| binding.category != ShaderResourceCategory::PushConstants && binding.bind_group as usize >= MAX_BIND_GROUPS)
    {
        return reject(format!(
            "Binding '{}' uses bind group {} but only {MAX_BIND_GROUPS} are supported",
            binding.name, binding.bind_group
        ));
    }
    if desc
        .binding_mapping
        .iter()
        .filter(|binding| binding.category == ShaderResourceCategory::PushConstants)
        .count()
        > 1
    {
        return reject("A shader can declare at most one push constant block");
    }
    if let Some(binding) = desc.binding_mapping.iter().find(|binding| {
        binding.category == ShaderResourceCategory::PushConstants && binding.block_size > u32::from(u16::MAX)
    }) {
        return reject(format!("Push constant block '{}' is larger than 64 KiB", binding.name));
    }
    Ok(())
}

pub(crate) fn validate_vertex_declaration(desc: &VertexDeclarationDesc, capabilities: &DeviceCapabilities) -> GalResult<()> {
    let binding_count = desc
        .attributes
        .iter()
        .map(|attribute| attribute.vertex_buffer_slot as usize + 1)
        .max()
        .unwrap_or(0);

    if desc.bindings.len() != binding_count {
        return reject(format!(
            "{} vertex bindings given but the attributes use {binding_count}",
            desc.bindings.len()
        ));
    }
    let max_bindings = MAX_VERTEX_BUFFERS.min(capabilities.max_vertex_buffers as usize);
    if desc.bindings.len() > max_bindings {
        return reject(format!(
            "Too many vertex bindings ({}), only up to {max_bindings} are supported",
            desc.bindings.len()
        ));
    }
    Ok(())
}
