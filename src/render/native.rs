use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use pollster::block_on;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::depth_target::validate_size;
use super::check_vertex_inputs;
use super::{
    Command, CommandList, LinkedProgram, MeshHandle, ProgramHandle, RenderBackend, RenderError,
    RenderTarget, TargetHandle, Viewport,
};
use crate::mesh::{Mesh, Topology, Vertex};
use crate::shader::reflect::{SHADOW_MAP_GROUP, UNIFORM_GROUP};
use crate::shader::ProgramInterface;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_UNIFORM_CAPACITY: u64 = 64 * 1024;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x3,
    3 => Float32x2
];

/// wgpu renderer executing recorded frames on a window surface.
pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    uniform_alignment: u64,
    empty_layout: wgpu::BindGroupLayout,
    empty_bind_group: wgpu::BindGroup,
    shadow_layout: wgpu::BindGroupLayout,
    shadow_sampler: wgpu::Sampler,
    fallback_shadow: ShadowTexture,
    programs: Vec<ProgramGpu>,
    targets: Vec<ShadowTexture>,
    meshes: Vec<MeshBuffers>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    errors: Vec<String>,
}

impl WgpuBackend {
    /// Initializes the GPU for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
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
        info!("using {} ({:?})", adapter_info.name, adapter_info.backend);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shadow-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        // Colors are written unconverted.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let uniform_alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_buffer = create_uniform_buffer(&device, INITIAL_UNIFORM_CAPACITY);

        let empty_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("empty-bind-layout"),
            entries: &[],
        });
        let empty_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("empty-bind-group"),
            layout: &empty_layout,
            entries: &[],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });
        // Raw depth fetches; the comparison happens in the shader.
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: None,
            ..Default::default()
        });

        let fallback_shadow = ShadowTexture::create(
            &device,
            &shadow_layout,
            &shadow_sampler,
            "shadow-fallback",
            Viewport::new(1, 1),
        );
        fallback_shadow.clear(&device, &queue, 1.0);

        if let Some(err) = device.pop_error_scope().await {
            return Err(anyhow!("GPU initialisation failed: {err}"));
        }

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_CAPACITY,
            uniform_alignment,
            empty_layout,
            empty_bind_group,
            shadow_layout,
            shadow_sampler,
            fallback_shadow,
            programs: Vec::new(),
            targets: Vec::new(),
            meshes: Vec::new(),
            pipelines: HashMap::new(),
            errors: Vec::new(),
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    fn attachment_size(&self, target: RenderTarget) -> Viewport {
        match target {
            RenderTarget::Window => Viewport::new(self.config.width, self.config.height),
            RenderTarget::Depth(handle) => self
                .targets
                .get(handle.index())
                .map(|target| target.size)
                .unwrap_or(Viewport::new(1, 1)),
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<(), RenderError> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let program = self
            .programs
            .get(key.program.index())
            .ok_or(RenderError::UnknownHandle {
                kind: "program",
                index: key.program.index(),
            })?;

        let targets = match key.target {
            TargetKind::Window => vec![Some(wgpu::ColorTargetState {
                format: self.config.format,
                blend: None,
                write_mask: if key.color_writes && program.interface.writes_color {
                    wgpu::ColorWrites::ALL
                } else {
                    wgpu::ColorWrites::empty()
                },
            })],
            TargetKind::Depth => Vec::new(),
        };
        // Triangles are wound counter-clockwise seen from outside.
        let (topology, cull_mode) = match key.topology {
            Topology::Triangles => (wgpu::PrimitiveTopology::TriangleList, Some(wgpu::Face::Back)),
            Topology::Lines => (wgpu::PrimitiveTopology::LineList, None),
        };

        debug!("building pipeline for {key:?}");
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{}-pipeline", program.label)),
                layout: Some(&program.layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some(program.vertex_entry.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: Vertex::STRIDE,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &program.attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some(program.fragment_entry.as_str()),
                    compilation_options: Default::default(),
                    targets: &targets,
                }),
                multiview: None,
                cache: None,
            });
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Grows the shared uniform buffer, rebinding every program to it.
    fn reserve_uniforms(&mut self, size: u64) {
        if size <= self.uniform_capacity {
            return;
        }
        let capacity = size.next_power_of_two();
        debug!("growing uniform buffer to {capacity} bytes");
        self.uniform_buffer = create_uniform_buffer(&self.device, capacity);
        self.uniform_capacity = capacity;
        for program in &mut self.programs {
            if let Some(layout) = program.uniform_layout.as_ref() {
                program.uniform_bind_group = Some(create_uniform_bind_group(
                    &self.device,
                    layout,
                    &self.uniform_buffer,
                    &program.label,
                    program.interface.uniform_size as u64,
                ));
            }
        }
    }

    /// Resolves the recorded frame into passes of concrete draws, building
    /// pipelines and packing uniform snapshots on the way.
    fn plan(&mut self, commands: &CommandList) -> Result<(Vec<PassPlan>, Vec<u8>), RenderError> {
        let mut plans = Vec::new();
        let mut uniforms = Vec::new();
        let mut viewport = commands.window_viewport();
        let mut color_writes = true;
        let mut program: Option<(ProgramHandle, Option<u32>)> = None;
        let mut shadow_map: Option<TargetHandle> = None;

        for pass in commands.passes() {
            let mut plan = PassPlan {
                target: pass.target,
                clear_color: pass.clear_color,
                clear_depth: pass.clear_depth,
                ops: vec![Op::Viewport(viewport)],
                draws: 0,
            };
            for command in pass.commands {
                match command {
                    Command::SetViewport(next) => {
                        viewport = *next;
                        plan.ops.push(Op::Viewport(viewport));
                    }
                    Command::SetColorWrites(enabled) => color_writes = *enabled,
                    Command::UseProgram {
                        program: handle,
                        uniforms: snapshot,
                    } => {
                        if handle.index() >= self.programs.len() {
                            return Err(RenderError::UnknownHandle {
                                kind: "program",
                                index: handle.index(),
                            });
                        }
                        let offset = if snapshot.is_empty() {
                            None
                        } else {
                            let offset = uniforms.len();
                            uniforms.extend_from_slice(snapshot);
                            let padded = (uniforms.len() as u64)
                                .next_multiple_of(self.uniform_alignment);
                            uniforms.resize(padded as usize, 0);
                            Some(offset as u32)
                        };
                        program = Some((*handle, offset));
                    }
                    Command::ReleaseProgram => program = None,
                    Command::BindShadowMap(target) => {
                        if let Some(handle) = target {
                            if handle.index() >= self.targets.len() {
                                return Err(RenderError::UnknownHandle {
                                    kind: "depth target",
                                    index: handle.index(),
                                });
                            }
                        }
                        shadow_map = *target;
                    }
                    Command::Draw(mesh) => {
                        let Some((handle, uniform_offset)) = program else {
                            continue;
                        };
                        let topology = self
                            .meshes
                            .get(mesh.index())
                            .map(|buffers| buffers.topology)
                            .ok_or(RenderError::UnknownHandle {
                                kind: "mesh",
                                index: mesh.index(),
                            })?;
                        let key = PipelineKey {
                            program: handle,
                            target: TargetKind::from(pass.target),
                            color_writes,
                            topology,
                        };
                        self.ensure_pipeline(key)?;
                        plan.ops.push(Op::Draw {
                            key,
                            uniform_offset,
                            shadow_map,
                            mesh: *mesh,
                        });
                        plan.draws += 1;
                    }
                    Command::BindTarget(_) | Command::Clear { .. } => {}
                }
            }
            if pass.is_visible() {
                plans.push(plan);
            }
        }
        Ok((plans, uniforms))
    }

    fn encode_frame(
        &mut self,
        commands: &CommandList,
        frame: &wgpu::SurfaceTexture,
    ) -> Result<(), RenderError> {
        let (plans, uniforms) = self.plan(commands)?;
        if !uniforms.is_empty() {
            self.reserve_uniforms(uniforms.len() as u64);
            self.queue.write_buffer(&self.uniform_buffer, 0, &uniforms);
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        for plan in &plans {
            let color_view = match plan.target {
                RenderTarget::Window => Some(&view),
                RenderTarget::Depth(_) => None,
            };
            let depth_view = match plan.target {
                RenderTarget::Window => &self.depth.view,
                RenderTarget::Depth(handle) => self
                    .targets
                    .get(handle.index())
                    .map(|target| &target.view)
                    .ok_or(RenderError::UnknownHandle {
                        kind: "depth target",
                        index: handle.index(),
                    })?,
            };
            let color_attachments = [color_view.map(|view| wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match plan.clear_color {
                        Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
            })];
            let color_attachments: &[Option<wgpu::RenderPassColorAttachment<'_>>] =
                if color_view.is_some() {
                    &color_attachments
                } else {
                    &[]
                };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(match plan.target {
                    RenderTarget::Window => "color-pass",
                    RenderTarget::Depth(_) => "depth-pass",
                }),
                color_attachments,
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: match plan.clear_depth {
                            Some(depth) => wgpu::LoadOp::Clear(depth),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if plan.draws == 0 {
                continue;
            }
            let attachment = self.attachment_size(plan.target);
            for op in &plan.ops {
                match op {
                    Op::Viewport(viewport) => {
                        let width = viewport.width.min(attachment.width).max(1);
                        let height = viewport.height.min(attachment.height).max(1);
                        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
                    }
                    Op::Draw {
                        key,
                        uniform_offset,
                        shadow_map,
                        mesh,
                    } => {
                        let (Some(pipeline), Some(program), Some(buffers)) = (
                            self.pipelines.get(key),
                            self.programs.get(key.program.index()),
                            self.meshes.get(mesh.index()),
                        ) else {
                            continue;
                        };
                        pass.set_pipeline(pipeline);
                        match (&program.uniform_bind_group, uniform_offset) {
                            (Some(bind_group), Some(offset)) => {
                                pass.set_bind_group(UNIFORM_GROUP, bind_group, &[*offset]);
                            }
                            _ => pass.set_bind_group(UNIFORM_GROUP, &self.empty_bind_group, &[]),
                        }
                        if program.interface.samples_shadow_map {
                            let shadow = shadow_map
                                .and_then(|handle| self.targets.get(handle.index()))
                                .unwrap_or(&self.fallback_shadow);
                            pass.set_bind_group(SHADOW_MAP_GROUP, &shadow.bind_group, &[]);
                        }
                        pass.set_vertex_buffer(0, buffers.vertex.slice(..));
                        pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..buffers.index_count, 0, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn create_program(&mut self, program: &LinkedProgram<'_>) -> Result<ProgramHandle, RenderError> {
        check_vertex_inputs(program)?;
        let attributes = VERTEX_ATTRIBUTES
            .iter()
            .filter(|attribute| {
                program
                    .interface
                    .vertex_inputs
                    .contains(&attribute.shader_location)
            })
            .copied()
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}-vertex", program.label)),
                source: wgpu::ShaderSource::Wgsl(program.vertex_source.into()),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}-fragment", program.label)),
                source: wgpu::ShaderSource::Wgsl(program.fragment_source.into()),
            });

        let uniform_size = program.interface.uniform_size as u64;
        let uniform_layout = (uniform_size > 0).then(|| {
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{}-uniform-layout", program.label)),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: NonZeroU64::new(uniform_size),
                        },
                        count: None,
                    }],
                })
        });
        let uniform_bind_group = uniform_layout.as_ref().map(|layout| {
            create_uniform_bind_group(
                &self.device,
                layout,
                &self.uniform_buffer,
                program.label,
                uniform_size,
            )
        });

        let mut bind_group_layouts = vec![uniform_layout.as_ref().unwrap_or(&self.empty_layout)];
        if program.interface.samples_shadow_map {
            bind_group_layouts.push(&self.shadow_layout);
        }
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{}-layout", program.label)),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });

        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Backend(err.to_string()));
        }

        let handle = ProgramHandle::from_index(self.programs.len());
        self.programs.push(ProgramGpu {
            label: program.label.to_string(),
            vertex,
            fragment,
            vertex_entry: program.vertex_entry.to_string(),
            fragment_entry: program.fragment_entry.to_string(),
            interface: program.interface.clone(),
            attributes,
            layout,
            uniform_layout,
            uniform_bind_group,
        });
        Ok(handle)
    }

    fn create_depth_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, RenderError> {
        validate_size(width, height, self.device.limits().max_texture_dimension_2d)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let target = ShadowTexture::create(
            &self.device,
            &self.shadow_layout,
            &self.shadow_sampler,
            label,
            Viewport::new(width, height),
        );
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(RenderError::FramebufferIncomplete {
                width,
                height,
                reason: err.to_string(),
            });
        }

        let handle = TargetHandle::from_index(self.targets.len());
        self.targets.push(target);
        Ok(handle)
    }

    fn create_mesh(&mut self, label: &str, mesh: &Mesh) -> Result<MeshHandle, RenderError> {
        let handle = MeshHandle::from_index(self.meshes.len());
        self.meshes
            .push(MeshBuffers::from_mesh(&self.device, mesh, label));
        Ok(handle)
    }

    fn update_mesh(&mut self, handle: MeshHandle, mesh: &Mesh) -> Result<(), RenderError> {
        let buffers = self
            .meshes
            .get_mut(handle.index())
            .ok_or(RenderError::UnknownHandle {
                kind: "mesh",
                index: handle.index(),
            })?;
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        if vertex_bytes.len() as u64 <= buffers.vertex.size()
            && index_bytes.len() as u64 <= buffers.index.size()
            && buffers.topology == mesh.topology
        {
            self.queue.write_buffer(&buffers.vertex, 0, vertex_bytes);
            self.queue.write_buffer(&buffers.index, 0, index_bytes);
            buffers.index_count = mesh.index_count();
        } else {
            let label = buffers.label.clone();
            *buffers = MeshBuffers::from_mesh(&self.device, mesh, &label);
        }
        Ok(())
    }

    fn window_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn submit(&mut self, commands: &CommandList) -> Result<(), RenderError> {
        let frame = self.surface.get_current_texture()?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = self.encode_frame(commands, &frame);
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            self.errors.push(err.to_string());
        }
        result?;

        frame.present();
        Ok(())
    }

    fn poll_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TargetKind {
    Window,
    Depth,
}

impl From<RenderTarget> for TargetKind {
    fn from(target: RenderTarget) -> Self {
        match target {
            RenderTarget::Window => TargetKind::Window,
            RenderTarget::Depth(_) => TargetKind::Depth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    target: TargetKind,
    color_writes: bool,
    topology: Topology,
}

enum Op {
    Viewport(Viewport),
    Draw {
        key: PipelineKey,
        uniform_offset: Option<u32>,
        shadow_map: Option<TargetHandle>,
        mesh: MeshHandle,
    },
}

struct PassPlan {
    target: RenderTarget,
    clear_color: Option<[f64; 4]>,
    clear_depth: Option<f32>,
    ops: Vec<Op>,
    draws: usize,
}

struct ProgramGpu {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    interface: ProgramInterface,
    /// Vertex attributes the vertex stage reads.
    attributes: Vec<wgpu::VertexAttribute>,
    layout: wgpu::PipelineLayout,
    uniform_layout: Option<wgpu::BindGroupLayout>,
    uniform_bind_group: Option<wgpu::BindGroup>,
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform-snapshots"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
    size: u64,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label}-uniforms")),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(size),
            }),
        }],
    })
}

struct MeshBuffers {
    label: String,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    topology: Topology,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            label: label.to_string(),
            vertex,
            index,
            index_count: mesh.index_count(),
            topology: mesh.topology,
        }
    }
}

/// Depth texture that can be rendered into and sampled.
struct ShadowTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    size: Viewport,
}

impl ShadowTexture {
    fn create(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        size: Viewport,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}-bind-group")),
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
        });
        Self {
            _texture: texture,
            view,
            bind_group,
            size,
        }
    }

    fn clear(&self, device: &wgpu::Device, queue: &wgpu::Queue, depth: f32) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("shadow-clear"),
        });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shadow-clear-pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        queue.submit(std::iter::once(encoder.finish()));
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("window-depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
