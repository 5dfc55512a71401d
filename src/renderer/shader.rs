//! Shader programs with named uniform slots
//!
//! Each WGSL program declares two uniform blocks: `frame` (group 0, set once
//! per pass) and `draw` (group 1, one slot per draw call behind a dynamic
//! offset). Field offsets are reflected from the WGSL source with naga, so
//! the CPU side writes uniforms by name and never mirrors the struct layout.
//! Writing a name the program doesn't declare is skipped, not an error.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec4};

/// Per-pass uniform block name
pub const FRAME_BLOCK: &str = "frame";
/// Per-draw uniform block name
pub const DRAW_BLOCK: &str = "draw";

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("{label}: {message}")]
    Parse { label: String, message: String },

    #[error("{label}: no uniform block named '{block}'")]
    MissingBlock { label: String, block: String },

    #[error("{label}: uniform block '{block}' is not a struct")]
    NotAStruct { label: String, block: String },
}

/// Byte range of one field inside a uniform block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformField {
    pub offset: u32,
    pub size: u32,
}

/// Reflected layout of one uniform block
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLayout {
    pub block: String,
    pub group: u32,
    pub binding: u32,
    /// Struct size including trailing padding
    pub size: u32,
    fields: HashMap<String, UniformField>,
}

impl UniformLayout {
    fn reflect(module: &naga::Module, label: &str, block: &str) -> Result<Self, ShaderError> {
        let var = module
            .global_variables
            .iter()
            .map(|(_, var)| var)
            .find(|var| {
                var.space == naga::AddressSpace::Uniform && var.name.as_deref() == Some(block)
            })
            .ok_or_else(|| ShaderError::MissingBlock {
                label: label.to_string(),
                block: block.to_string(),
            })?;

        let naga::TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
            return Err(ShaderError::NotAStruct {
                label: label.to_string(),
                block: block.to_string(),
            });
        };

        // A field ends where the next one starts; vec3 and mat3 padding is
        // included, which is what the writers expect.
        let mut fields = HashMap::new();
        for (i, member) in members.iter().enumerate() {
            let end = members.get(i + 1).map_or(*span, |next| next.offset);
            if let Some(name) = &member.name {
                fields.insert(
                    name.clone(),
                    UniformField {
                        offset: member.offset,
                        size: end - member.offset,
                    },
                );
            }
        }

        let (group, binding) = var
            .binding
            .as_ref()
            .map_or((0, 0), |b| (b.group, b.binding));

        Ok(Self {
            block: block.to_string(),
            group,
            binding,
            size: *span,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<UniformField> {
        self.fields.get(name).copied()
    }

    pub fn writer(&self) -> UniformWriter<'_> {
        UniformWriter {
            layout: self,
            bytes: vec![0; self.size as usize],
        }
    }
}

/// Builds the bytes of one uniform block by field name
///
/// Every setter returns `false` when the program has no such field.
pub struct UniformWriter<'a> {
    layout: &'a UniformLayout,
    bytes: Vec<u8>,
}

impl UniformWriter<'_> {
    fn write(&mut self, name: &str, data: &[u8]) -> bool {
        let Some(field) = self.layout.field(name) else {
            log::trace!("{}: no uniform '{}', skipped", self.layout.block, name);
            return false;
        };
        let start = field.offset as usize;
        let len = data.len().min(field.size as usize);
        self.bytes[start..start + len].copy_from_slice(&data[..len]);
        true
    }

    pub fn set_mat4(&mut self, name: &str, m: Mat4) -> bool {
        self.write(name, bytemuck::bytes_of(&m.to_cols_array()))
    }

    /// mat3x3 columns are 16-byte aligned in uniform memory
    pub fn set_mat3(&mut self, name: &str, m: Mat3) -> bool {
        let padded = [
            m.x_axis.extend(0.0),
            m.y_axis.extend(0.0),
            m.z_axis.extend(0.0),
        ];
        self.write(name, bytemuck::cast_slice(&padded))
    }

    pub fn set_vec4(&mut self, name: &str, v: Vec4) -> bool {
        self.write(name, bytemuck::bytes_of(&v))
    }

    pub fn set_f32(&mut self, name: &str, v: f32) -> bool {
        self.write(name, bytemuck::bytes_of(&v))
    }

    pub fn set_u32(&mut self, name: &str, v: u32) -> bool {
        self.write(name, bytemuck::bytes_of(&v))
    }

    pub fn set_bool(&mut self, name: &str, v: bool) -> bool {
        self.set_u32(name, v as u32)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// CPU-side view of a program: its reflected uniform blocks
#[derive(Debug, Clone)]
pub struct ShaderInterface {
    pub label: String,
    pub frame: UniformLayout,
    pub draw: UniformLayout,
}

impl ShaderInterface {
    pub fn reflect(label: &str, source: &str) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;
        Ok(Self {
            label: label.to_string(),
            frame: UniformLayout::reflect(&module, label, FRAME_BLOCK)?,
            draw: UniformLayout::reflect(&module, label, DRAW_BLOCK)?,
        })
    }
}

/// A compiled shader module plus its reflected interface
pub struct ShaderProgram {
    pub module: wgpu::ShaderModule,
    pub interface: ShaderInterface,
}

impl ShaderProgram {
    pub fn new(device: &wgpu::Device, label: &str, source: &str) -> Result<Self, ShaderError> {
        let interface = ShaderInterface::reflect(label, source)?;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        log::debug!(
            "Shader {}: frame {} bytes, draw {} bytes",
            label,
            interface.frame.size,
            interface.draw.size
        );
        Ok(Self { module, interface })
    }

    pub fn frame(&self) -> UniformWriter<'_> {
        self.interface.frame.writer()
    }

    pub fn draw(&self) -> UniformWriter<'_> {
        self.interface.draw.writer()
    }
}

/// Round `value` up to a multiple of `alignment`
pub fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Most draw slots one dynamic uniform buffer holds per frame
pub const MAX_DRAW_SLOTS: u32 = 256;

/// Per-draw uniforms for one frame, addressed with dynamic offsets
pub struct DynamicUniforms {
    pub buffer: wgpu::Buffer,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    stride: u64,
    staging: Vec<u8>,
    len: u32,
}

impl DynamicUniforms {
    pub fn new(device: &wgpu::Device, label: &str, block: &UniformLayout) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = align_to(block.size as u64, alignment);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * MAX_DRAW_SLOTS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(block.size as u64),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: block.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(block.size as u64),
                }),
            }],
        });

        Self {
            buffer,
            layout,
            bind_group,
            stride,
            staging: Vec::with_capacity((stride * MAX_DRAW_SLOTS as u64) as usize),
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.staging.clear();
        self.len = 0;
    }

    /// Append one draw's uniforms, returning its dynamic offset
    pub fn push(&mut self, writer: &UniformWriter<'_>) -> Option<u32> {
        if self.len >= MAX_DRAW_SLOTS {
            return None;
        }
        let offset = self.staging.len();
        self.staging.extend_from_slice(writer.as_bytes());
        self.staging.resize(offset + self.stride as usize, 0);
        self.len += 1;
        Some(offset as u32)
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const LIT: &str = include_str!("shaders/lit.wgsl");
    const DEPTH: &str = include_str!("shaders/depth.wgsl");

    #[test]
    fn test_lit_frame_layout() {
        let lit = ShaderInterface::reflect("lit", LIT).unwrap();
        let frame = &lit.frame;
        assert_eq!((frame.group, frame.binding), (0, 0));
        assert_eq!(frame.field("view_proj"), Some(UniformField { offset: 0, size: 64 }));
        assert_eq!(frame.field("light_view_proj").map(|f| f.offset), Some(64));
        assert_eq!(frame.field("camera_pos").map(|f| f.offset), Some(128));
        assert_eq!(frame.field("game_over").map(|f| f.size), Some(4));
        assert_eq!(frame.size % 16, 0);
    }

    #[test]
    fn test_lit_draw_layout_pads_mat3() {
        let lit = ShaderInterface::reflect("lit", LIT).unwrap();
        let draw = &lit.draw;
        assert_eq!((draw.group, draw.binding), (1, 0));
        assert_eq!(draw.field("model"), Some(UniformField { offset: 0, size: 64 }));
        assert_eq!(draw.field("normal_matrix"), Some(UniformField { offset: 64, size: 48 }));
        assert_eq!(draw.field("base_color").map(|f| f.offset), Some(112));
    }

    #[test]
    fn test_depth_program_is_minimal() {
        let depth = ShaderInterface::reflect("depth", DEPTH).unwrap();
        assert!(depth.frame.field("light_view_proj").is_some());
        assert!(depth.draw.field("model").is_some());
        assert!(depth.draw.field("base_color").is_none());
    }

    #[test]
    fn test_missing_uniform_is_skipped() {
        let depth = ShaderInterface::reflect("depth", DEPTH).unwrap();
        let mut w = depth.draw.writer();
        assert!(w.set_mat4("model", Mat4::from_translation(Vec3::X)));
        assert!(!w.set_vec4("base_color", Vec4::ONE));
        assert!(!w.set_bool("has_alpha", true));
        assert_eq!(w.as_bytes().len(), depth.draw.size as usize);
    }

    #[test]
    fn test_writer_places_bytes_at_reflected_offsets() {
        let lit = ShaderInterface::reflect("lit", LIT).unwrap();
        let mut w = lit.draw.writer();
        assert!(w.set_mat3("normal_matrix", Mat3::from_diagonal(Vec3::new(1.0, 2.0, 3.0))));
        assert!(w.set_f32("alpha_cutoff", 0.4));

        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(w.as_bytes());
        // Columns at 64, 80, 96 with a padding lane each
        assert_eq!(&floats[16..20], &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&floats[20..24], &[0.0, 2.0, 0.0, 0.0]);
        assert_eq!(&floats[24..28], &[0.0, 0.0, 3.0, 0.0]);
        let cutoff = lit.draw.field("alpha_cutoff").unwrap().offset as usize / 4;
        assert_eq!(floats[cutoff], 0.4);
    }

    #[test]
    fn test_missing_block_is_an_error() {
        let src = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
        let err = ShaderInterface::reflect("bare", src).unwrap_err();
        assert!(matches!(err, ShaderError::MissingBlock { .. }));

        let err = ShaderInterface::reflect("broken", "fn (").unwrap_err();
        assert!(matches!(err, ShaderError::Parse { .. }));
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(144, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(80, 0), 80);
    }
}
