use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::bytes_of;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::errors::ErrorScope;
use super::gpu::{
    create_cube_texture, create_texture, sampler_layout_entry, texture_layout_entry,
    uniform_layout_entry, vertex_layout, DepthBuffer, Draw, GlobalUniform, GpuModel, GpuPart,
    MeshBuffers, ObjectConstants,
};
use super::shaders;
use super::shadow::ShadowPass;
use crate::app::{PolygonFill, RenderState};
use crate::assets::{self, FallbackMesh, SkyboxData, TextureData};
use crate::config::DemoConfig;
use crate::scene::{Scene, Shading};

/// Linear 0.5 grey, the fog color, as sRGB bytes.
const SKY_FALLBACK_COLOR: [u8; 4] = [188, 188, 188, 255];

/// GPU renderer that draws the shadow-mapped scene into a window.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    lit: PipelineSet,
    emissive: PipelineSet,
    skybox: SkyboxPass,
    shadow: ShadowPass,
    objects: Vec<GpuObject>,
    warned_modes: HashSet<PolygonFill>,
}

/// Uploaded model plus the uniform slot its constants are written to.
struct GpuObject {
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    model: GpuModel,
}

/// One pipeline per rasterization mode the device supports.
struct PipelineSet {
    fill: wgpu::RenderPipeline,
    line: Option<wgpu::RenderPipeline>,
    point: Option<wgpu::RenderPipeline>,
}

impl PipelineSet {
    fn new(
        features: wgpu::Features,
        build: impl Fn(wgpu::PolygonMode) -> wgpu::RenderPipeline,
    ) -> Self {
        Self {
            fill: build(wgpu::PolygonMode::Fill),
            line: features
                .contains(wgpu::Features::POLYGON_MODE_LINE)
                .then(|| build(wgpu::PolygonMode::Line)),
            point: features
                .contains(wgpu::Features::POLYGON_MODE_POINT)
                .then(|| build(wgpu::PolygonMode::Point)),
        }
    }

    /// Returns the pipeline for `mode`, or `None` when the device lacks it.
    fn get(&self, mode: PolygonFill) -> Option<&wgpu::RenderPipeline> {
        match mode {
            PolygonFill::Fill => Some(&self.fill),
            PolygonFill::Line => self.line.as_ref(),
            PolygonFill::Point => self.point.as_ref(),
        }
    }
}

struct SkyboxPass {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
}

struct PipelineTargets<'a> {
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    format: wgpu::TextureFormat,
}

fn scene_pipeline(
    device: &wgpu::Device,
    targets: &PipelineTargets<'_>,
    label: &str,
    fragment_entry: &str,
    polygon_mode: wgpu::PolygonMode,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(targets.layout),
        vertex: wgpu::VertexState {
            module: targets.shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthBuffer::FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: targets.shader,
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: targets.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

impl Renderer {
    /// Initializes the GPU, uploads every scene asset and builds the
    /// shadow, lit, emissive and skybox pipelines.
    pub async fn new(window: Arc<Window>, config: &DemoConfig, scene: &Scene) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();
        info!(
            "GPU: {} ({:?}, driver {})",
            adapter_info.name, adapter_info.backend, adapter_info.driver_info
        );

        let wanted = wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::POLYGON_MODE_POINT;
        let features = adapter.features() & wanted;
        if features != wanted {
            warn!("adapter lacks {:?}; those modes will draw filled", wanted - features);
        }

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shadow-scene-device"),
            required_features: features,
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let scope = ErrorScope::push(&device);

        // vsync on
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);

        let depth = DepthBuffer::create(&device, surface_config.width, surface_config.height);

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::scene_source().into()),
        });
        let skybox_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("skybox-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::skybox_source().into()),
        });

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[uniform_layout_entry(0, std::mem::size_of::<GlobalUniform>())],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[uniform_layout_entry(0, std::mem::size_of::<ObjectConstants>())],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bind-layout"),
            entries: &[
                texture_layout_entry(0, wgpu::TextureViewDimension::D2),
                texture_layout_entry(1, wgpu::TextureViewDimension::D2),
                sampler_layout_entry(2),
            ],
        });
        let skybox_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skybox-bind-layout"),
            entries: &[
                texture_layout_entry(0, wgpu::TextureViewDimension::Cube),
                sampler_layout_entry(1),
            ],
        });
        let shadow_layout = ShadowPass::sample_layout(&device);

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let shadow = ShadowPass::new(
            &device,
            &scene_shader,
            &global_layout,
            &object_layout,
            &shadow_layout,
            config.shadow_map_size,
        );
        debug!("shadow map {0}x{0}", shadow.map_size());

        let lit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout, &material_layout, &shadow_layout],
            push_constant_ranges: &[],
        });
        let lit_targets = PipelineTargets {
            layout: &lit_layout,
            shader: &scene_shader,
            format: surface_format,
        };
        let lit = PipelineSet::new(features, |mode| {
            scene_pipeline(&device, &lit_targets, "lit-pipeline", "fs_main", mode)
        });

        let emissive_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("emissive-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });
        let emissive_targets = PipelineTargets {
            layout: &emissive_layout,
            shader: &scene_shader,
            format: surface_format,
        };
        let emissive = PipelineSet::new(features, |mode| {
            scene_pipeline(
                &device,
                &emissive_targets,
                "emissive-pipeline",
                "fs_emissive",
                mode,
            )
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let skybox_data = SkyboxData::load_or(&scene.skybox_dir, SKY_FALLBACK_COLOR);
        let skybox = SkyboxPass::new(
            &device,
            &queue,
            &skybox_shader,
            &global_layout,
            &skybox_layout,
            surface_format,
            &skybox_data,
        );

        let white = TextureData::white();
        let mut objects = Vec::with_capacity(scene.objects.len());
        for object in &scene.objects {
            let fallback = object.fallback.unwrap_or(FallbackMesh::Cube);
            let data = assets::load_model_or(&object.model_path, fallback);
            info!(
                "uploading {} ({} parts) from {}",
                object.name,
                data.parts.len(),
                object.model_path.display()
            );

            let parts = data
                .parts
                .iter()
                .enumerate()
                .map(|(index, part)| {
                    let label = format!("{}-{index}", object.name);
                    let diffuse = create_texture(
                        &device,
                        &queue,
                        part.diffuse.as_ref().unwrap_or(&white),
                        &format!("{label}-diffuse"),
                    );
                    let specular = create_texture(
                        &device,
                        &queue,
                        part.specular.as_ref().unwrap_or(&white),
                        &format!("{label}-specular"),
                    );
                    let material = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(&format!("{label}-material")),
                        layout: &material_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(&diffuse),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::TextureView(&specular),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: wgpu::BindingResource::Sampler(&sampler),
                            },
                        ],
                    });
                    GpuPart {
                        mesh: MeshBuffers::from_mesh(&device, &part.mesh, &label),
                        material,
                    }
                })
                .collect();

            let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-uniform", object.name)),
                contents: bytes_of(&ObjectConstants::new(
                    glam::Mat4::IDENTITY,
                    glam::Mat4::IDENTITY,
                    object.alpha_test,
                )),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{}-bind-group", object.name)),
                layout: &object_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                }],
            });
            objects.push(GpuObject {
                uniform,
                bind_group,
                model: GpuModel { parts },
            });
        }

        scope.check();

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config: surface_config,
            size,
            depth,
            global_buffer,
            global_bind_group,
            lit,
            emissive,
            skybox,
            shadow,
            objects,
            warned_modes: HashSet::new(),
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Resizes the swap chain and depth buffer; zero-area sizes are ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        let scope = ErrorScope::push(&self.device);
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
        scope.check();
    }

    /// Reconfigures the surface at its current size after it was lost.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    fn pipeline_for<'a>(
        set: &'a PipelineSet,
        mode: PolygonFill,
        warned: &mut HashSet<PolygonFill>,
    ) -> &'a wgpu::RenderPipeline {
        match set.get(mode) {
            Some(pipeline) => pipeline,
            None => {
                if warned.insert(mode) {
                    warn!("{mode:?} rasterization unsupported, drawing filled");
                }
                &set.fill
            }
        }
    }

    /// Renders one frame: shadow depth pass, then lit objects, the light
    /// marker and the skybox into the window.
    pub fn render(&mut self, scene: &Scene, state: &RenderState) -> Result<(), wgpu::SurfaceError> {
        let frame = state.frame();
        let ctx = state.object_context();

        let scope = ErrorScope::push(&self.device);

        self.queue.write_buffer(
            &self.global_buffer,
            0,
            bytes_of(&GlobalUniform::new(&frame, state)),
        );
        for (object, gpu) in scene.objects.iter().zip(&self.objects) {
            let constants =
                ObjectConstants::new(object.model_transform(&ctx), frame.view, object.alpha_test);
            self.queue.write_buffer(&gpu.uniform, 0, bytes_of(&constants));
        }

        // an early return drops the scope, which pops it
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let casters = scene
            .shadow_casters()
            .filter_map(|(index, _)| self.objects.get(index))
            .map(|gpu| (&gpu.bind_group, &gpu.model));
        self.shadow
            .encode(&mut encoder, &self.global_bind_group, casters);

        let fog = state.shading.fog_color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(fog.x),
                        g: f64::from(fog.y),
                        b: f64::from(fog.z),
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let mode = state.mode.polygon;
        pass.set_bind_group(0, &self.global_bind_group, &[]);

        pass.set_pipeline(Self::pipeline_for(&self.lit, mode, &mut self.warned_modes));
        pass.set_bind_group(3, self.shadow.bind_group(), &[]);
        for gpu in scene
            .by_shading(Shading::Lit)
            .filter_map(|(index, _)| self.objects.get(index))
        {
            pass.set_bind_group(1, &gpu.bind_group, &[]);
            gpu.model.draw(&mut pass, Some(2));
        }

        pass.set_pipeline(Self::pipeline_for(
            &self.emissive,
            mode,
            &mut self.warned_modes,
        ));
        for gpu in scene
            .by_shading(Shading::Emissive)
            .filter_map(|(index, _)| self.objects.get(index))
        {
            pass.set_bind_group(1, &gpu.bind_group, &[]);
            gpu.model.draw(&mut pass, None);
        }

        // drawn last so the depth test rejects every covered pixel; always
        // filled, a fullscreen triangle has no cube edges to outline
        pass.set_pipeline(&self.skybox.pipeline);
        pass.set_bind_group(1, &self.skybox.bind_group, &[]);
        pass.draw(0..3, 0..1);

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        scope.check();
        Ok(())
    }
}

impl SkyboxPass {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shader: &wgpu::ShaderModule,
        global_layout: &wgpu::BindGroupLayout,
        skybox_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
        data: &SkyboxData,
    ) -> Self {
        let view = create_cube_texture(device, queue, data);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox-bind-group"),
            layout: skybox_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("skybox-pipeline-layout"),
            bind_group_layouts: &[global_layout, skybox_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("skybox-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_sky"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_sky"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
        }
    }
}
