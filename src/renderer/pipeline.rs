//! Two-pass render state: light depth pass, then the lit surface pass

use std::path::Path;

use glam::{Mat4, Vec3};

use super::camera::Camera;
use super::drawable::{Drawable, PlayerAppearance, normal_matrix, scene_drawables};
use super::light::SUN;
use super::model::{GpuGeometry, GpuModel, MaterialBinder};
use super::shader::{DynamicUniforms, ShaderError, ShaderProgram, UniformWriter};
use super::shadow::{DepthPass, ShadowMap, comparison_sampler, fully_lit_fallback};
use super::shapes;
use super::vertex::{MeshVertex, colors};
use crate::assets::{MaterialFlags, ModelError, ModelProvider};
use crate::settings::{QualityPreset, Settings};
use crate::sim::GameState;

const SCENE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,

    #[error(transparent)]
    Shader(#[from] ShaderError),
}

/// What the player slot holds
enum PlayerModel {
    /// No model configured
    Cube,
    Loaded(GpuModel),
    /// Load failed; the player is not drawn
    Failed,
}

/// One indexed draw with everything both passes need
struct DrawItem<'a> {
    geometry: &'a GpuGeometry,
    model: Mat4,
    color: Vec3,
    material: MaterialFlags,
    texture: &'a wgpu::BindGroup,
}

/// Expand drawables into per-mesh draws
fn draw_items<'a>(
    drawables: &[Drawable],
    cube: &'a GpuGeometry,
    player: &'a PlayerModel,
    materials: &'a MaterialBinder,
) -> Vec<DrawItem<'a>> {
    let mut items = Vec::with_capacity(drawables.len());
    for drawable in drawables {
        match *drawable {
            Drawable::ProceduralCube { transform, color } => items.push(DrawItem {
                geometry: cube,
                model: transform,
                color,
                material: MaterialFlags::default(),
                texture: &materials.white,
            }),
            Drawable::ImportedMesh { transform } => {
                let PlayerModel::Loaded(model) = player else {
                    continue;
                };
                items.extend(model.meshes.iter().map(|mesh| DrawItem {
                    geometry: &mesh.geometry,
                    model: transform,
                    color: mesh.diffuse_color,
                    material: mesh.material,
                    texture: mesh.texture.as_ref().unwrap_or(&materials.white),
                }));
            }
        }
    }
    items
}

/// Per-draw uniforms; programs without a field just skip it
fn write_draw(writer: &mut UniformWriter<'_>, model: Mat4, color: Vec3, material: &MaterialFlags) {
    writer.set_mat4("model", model);
    writer.set_mat3("normal_matrix", normal_matrix(model));
    writer.set_vec4("base_color", color.extend(1.0));
    writer.set_bool("has_diffuse", material.has_diffuse_texture);
    writer.set_bool("has_alpha", material.has_alpha);
    writer.set_bool("use_alpha_test", material.uses_alpha_test());
    writer.set_f32("alpha_cutoff", material.alpha_cutoff);
}

fn create_scene_depth(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("scene_depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

/// Main render state
pub struct RenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    /// Viewport size in pixels
    pub size: (u32, u32),
    scene_depth: wgpu::TextureView,

    lit_program: ShaderProgram,
    depth_program: ShaderProgram,
    lit_pipeline: wgpu::RenderPipeline,
    hair_pipeline: wgpu::RenderPipeline,
    depth_pass: DepthPass,

    lit_frame_buffer: wgpu::Buffer,
    lit_frame_layout: wgpu::BindGroupLayout,
    lit_frame_bind_group: wgpu::BindGroup,
    lit_draws: DynamicUniforms,

    quality: QualityPreset,
    shadow: Option<ShadowMap>,
    shadow_fallback: ShadowMap,
    shadow_sampler: wgpu::Sampler,

    materials: MaterialBinder,
    cube: GpuGeometry,
    player: PlayerModel,
    slots_exhausted: bool,
}

impl RenderState {
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        settings: &Settings,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(target)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        log::info!("GPU adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("drop-dodge-device"),
                required_features: wgpu::Features::empty(),
                // Large shadow maps need the adapter's real texture limits
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if settings.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let scene_depth = create_scene_depth(&device, config.width, config.height);

        let lit_program = ShaderProgram::new(&device, "lit", include_str!("shaders/lit.wgsl"))?;
        let depth_program =
            ShaderProgram::new(&device, "depth", include_str!("shaders/depth.wgsl"))?;
        let depth_pass = DepthPass::new(&device, &depth_program);

        let materials = MaterialBinder::new(&device, &queue);
        let shadow_sampler = comparison_sampler(&device);
        let shadow_fallback = fully_lit_fallback(&device, &queue);

        let frame = &lit_program.interface.frame;
        let lit_frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lit_frame"),
            size: frame.size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lit_frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lit_frame_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: frame.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let lit_draws = DynamicUniforms::new(&device, "lit_draws", &lit_program.interface.draw);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit_pipeline_layout"),
            bind_group_layouts: &[&lit_frame_layout, &lit_draws.layout, &materials.layout],
            immediate_size: 0,
        });

        let make_pipeline = |label: &str, blend: wgpu::BlendState, depth_write: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &lit_program.module,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::desc()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &lit_program.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: SCENE_DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };
        let lit_pipeline = make_pipeline("lit_pipeline", wgpu::BlendState::REPLACE, true);
        let hair_pipeline = make_pipeline("hair_pipeline", wgpu::BlendState::ALPHA_BLENDING, false);

        let cube = GpuGeometry::from_shape(&device, "unit_cube", &shapes::unit_cube());

        let lit_frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lit_frame"),
            layout: &lit_frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: frame.binding,
                    resource: lit_frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_fallback.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let size = (config.width, config.height);
        let mut state = Self {
            surface,
            device,
            queue,
            config,
            size,
            scene_depth,
            lit_program,
            depth_program,
            lit_pipeline,
            hair_pipeline,
            depth_pass,
            lit_frame_buffer,
            lit_frame_layout,
            lit_frame_bind_group,
            lit_draws,
            quality: settings.quality,
            shadow: None,
            shadow_fallback,
            shadow_sampler,
            materials,
            cube,
            player: PlayerModel::Cube,
            slots_exhausted: false,
        };
        state.set_shadow_quality(settings.quality);
        Ok(state)
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
            self.scene_depth = create_scene_depth(&self.device, new_width, new_height);
        }
    }

    /// Reconfigure the surface at its current size (after `Lost`/`Outdated`)
    pub fn reconfigure(&mut self) {
        self.resize(self.size.0, self.size.1);
    }

    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    /// Recreate (or drop) the shadow map for a quality preset
    pub fn set_shadow_quality(&mut self, quality: QualityPreset) {
        self.quality = quality;
        let max = self.device.limits().max_texture_dimension_2d;
        self.shadow = quality.shadow_map_size().map(|size| {
            if size > max {
                log::warn!("Shadow map {} exceeds device limit, using {}", size, max);
            }
            ShadowMap::new(&self.device, size.min(max))
        });
        if self.shadow.is_none() {
            log::info!("Shadows disabled");
        }

        let shadow_view = &self.shadow.as_ref().unwrap_or(&self.shadow_fallback).view;
        self.lit_frame_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lit_frame"),
            layout: &self.lit_frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: self.lit_program.interface.frame.binding,
                    resource: self.lit_frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
            ],
        });
    }

    /// Load and upload the player model
    ///
    /// On failure the player is left undrawn and the error is returned for
    /// the caller to report.
    pub fn load_player_model(
        &mut self,
        provider: &dyn ModelProvider,
        path: &Path,
    ) -> Result<(), ModelError> {
        match provider.load_model(path) {
            Ok(data) => {
                let model = GpuModel::upload(&self.device, &self.queue, &self.materials, &data);
                log::info!(
                    "Player model uploaded: {} meshes, {} hair",
                    model.meshes.len(),
                    model.meshes.iter().filter(|m| m.material.is_hair).count()
                );
                self.player = PlayerModel::Loaded(model);
                Ok(())
            }
            Err(e) => {
                self.player = PlayerModel::Failed;
                Err(e)
            }
        }
    }

    pub fn player_appearance(&self) -> PlayerAppearance {
        match &self.player {
            PlayerModel::Cube => PlayerAppearance::Cube,
            PlayerModel::Loaded(model) => PlayerAppearance::Model(model.bounds),
            PlayerModel::Failed => PlayerAppearance::Hidden,
        }
    }

    /// Render one frame of `state`
    pub fn render(&mut self, state: &GameState, camera: &Camera) -> Result<(), wgpu::SurfaceError> {
        let drawables = scene_drawables(state, self.player_appearance());
        let items = draw_items(&drawables, &self.cube, &self.player, &self.materials);
        let light_view_proj = SUN.view_proj();

        // Per-draw uniforms for both programs
        self.depth_pass.draws.clear();
        self.lit_draws.clear();
        let mut offsets = Vec::with_capacity(items.len());
        for item in &items {
            let mut depth = self.depth_program.draw();
            write_draw(&mut depth, item.model, item.color, &item.material);
            let mut lit = self.lit_program.draw();
            write_draw(&mut lit, item.model, item.color, &item.material);
            match (self.depth_pass.draws.push(&depth), self.lit_draws.push(&lit)) {
                (Some(d), Some(l)) => offsets.push(Some((d, l))),
                _ => {
                    if !self.slots_exhausted {
                        log::warn!("Draw slots exhausted, skipping extra draws");
                        self.slots_exhausted = true;
                    }
                    offsets.push(None);
                }
            }
        }
        self.depth_pass.draws.upload(&self.queue);
        self.lit_draws.upload(&self.queue);

        let mut depth_frame = self.depth_program.frame();
        depth_frame.set_mat4("light_view_proj", light_view_proj);
        self.queue
            .write_buffer(&self.depth_pass.frame_buffer, 0, depth_frame.as_bytes());

        let dead = state.is_player_dead();
        let mut lit_frame = self.lit_program.frame();
        lit_frame.set_mat4("view_proj", camera.view_proj());
        lit_frame.set_mat4("light_view_proj", light_view_proj);
        lit_frame.set_vec4("camera_pos", camera.eye.extend(1.0));
        lit_frame.set_vec4("light_dir", SUN.dir().extend(0.0));
        lit_frame.set_vec4("light_color", SUN.color.extend(1.0));
        lit_frame.set_f32("light_intensity", SUN.intensity);
        lit_frame.set_f32("ambient", SUN.ambient);
        lit_frame.set_f32(
            "shadow_texel",
            self.shadow.as_ref().map_or(0.0, |s| s.texel()),
        );
        lit_frame.set_f32("game_over", if dead { 1.0 } else { 0.0 });
        self.queue
            .write_buffer(&self.lit_frame_buffer, 0, lit_frame.as_bytes());

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        // Pass 1: depth from the light
        if let Some(shadow) = &self.shadow {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &shadow.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_viewport(0.0, 0.0, shadow.size as f32, shadow.size as f32, 0.0, 1.0);
            pass.set_pipeline(&self.depth_pass.pipeline);
            pass.set_bind_group(0, &self.depth_pass.frame_bind_group, &[]);
            for (item, offset) in items.iter().zip(&offsets) {
                let Some((depth_offset, _)) = offset else {
                    continue;
                };
                pass.set_bind_group(1, &self.depth_pass.draws.bind_group, &[*depth_offset]);
                item.geometry.draw(&mut pass);
            }
        }

        // Pass 2: lit scene into the surface
        {
            let clear = if dead {
                colors::BACKGROUND_DEAD
            } else {
                colors::BACKGROUND
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lit_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0],
                            g: clear[1],
                            b: clear[2],
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.scene_depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.lit_pipeline);
            pass.set_bind_group(0, &self.lit_frame_bind_group, &[]);
            for (item, offset) in items.iter().zip(&offsets) {
                let Some((_, lit_offset)) = offset else {
                    continue;
                };
                if item.material.is_hair {
                    pass.set_pipeline(&self.hair_pipeline);
                }
                pass.set_bind_group(1, &self.lit_draws.bind_group, &[*lit_offset]);
                pass.set_bind_group(2, item.texture, &[]);
                item.geometry.draw(&mut pass);
                if item.material.is_hair {
                    pass.set_pipeline(&self.lit_pipeline);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
