//! GPU-side meshes and textures

use glam::Vec3;
use wgpu::util::DeviceExt;

use super::shapes::MeshGeometry;
use super::vertex::MeshVertex;
use crate::assets::{DiffuseImage, MaterialFlags, ModelData};
use crate::sim::Aabb;

/// Vertex and index buffers for one mesh
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuGeometry {
    pub fn new(device: &wgpu::Device, label: &str, vertices: &[MeshVertex], indices: &[u32]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    pub fn from_shape(device: &wgpu::Device, label: &str, shape: &MeshGeometry) -> Self {
        Self::new(device, label, &shape.vertices, &shape.indices)
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Group 2 of the lit program: a diffuse texture and its sampler
pub struct MaterialBinder {
    pub layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Bound for every draw without a texture of its own
    pub white: wgpu::BindGroup,
}

impl MaterialBinder {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("diffuse_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = upload_texture(
            device,
            queue,
            &layout,
            &sampler,
            "white",
            &DiffuseImage::from_rgba(1, 1, vec![255; 4]),
        );
        Self {
            layout,
            sampler,
            white,
        }
    }

    pub fn bind(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        image: &DiffuseImage,
    ) -> wgpu::BindGroup {
        upload_texture(device, queue, &self.layout, &self.sampler, label, image)
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    label: &str,
    image: &DiffuseImage,
) -> wgpu::BindGroup {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// One uploaded mesh of the player model
pub struct GpuMesh {
    pub geometry: GpuGeometry,
    pub material: MaterialFlags,
    pub diffuse_color: Vec3,
    /// `None` draws with the white texture
    pub texture: Option<wgpu::BindGroup>,
}

/// An uploaded model
pub struct GpuModel {
    pub meshes: Vec<GpuMesh>,
    pub bounds: Aabb,
}

impl GpuModel {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        materials: &MaterialBinder,
        data: &ModelData,
    ) -> Self {
        let meshes = data
            .meshes
            .iter()
            .filter(|mesh| !mesh.indices.is_empty())
            .map(|mesh| GpuMesh {
                geometry: GpuGeometry::new(device, &mesh.name, &mesh.vertices, &mesh.indices),
                material: mesh.material,
                diffuse_color: mesh.diffuse_color,
                texture: mesh
                    .diffuse_image
                    .as_ref()
                    .map(|image| materials.bind(device, queue, &mesh.name, image)),
            })
            .collect();
        Self {
            meshes,
            bounds: data.bounds,
        }
    }
}
