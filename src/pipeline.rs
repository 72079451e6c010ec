//! The two-pass shadow renderer: a depth pass from the light into the
//! shadow map, then a shaded color pass from the camera that samples it.

use std::time::Duration;

use glam::{DVec4, Mat4, Vec3 as FVec3, Vec4Swizzles};
use log::{debug, error, info};

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::light::{Light, LightOrbit};
use crate::mesh::Mesh;
use crate::render::{CommandList, DepthTarget, MeshHandle, RenderBackend, RenderError};
use crate::shader::{ShaderLibrary, ShaderProgram, StageSources};

/// Subtracted from the fragment's light depth before the comparison to
/// avoid self-shadowing acne.
pub const SHADOW_BIAS: f32 = 0.005;
/// Exponent of the specular highlight in the material program.
pub const SPECULAR_EXPONENT: f32 = 16.0;
/// Diffuse color of every shadow caster.
pub const CASTER_COLOR: FVec3 = FVec3::new(0.3, 1.0, 0.3);

const LIGHT_MARKER_COLOR: FVec3 = FVec3::new(1.0, 1.0, 0.0);
const GRID_COLOR: FVec3 = FVec3::splat(0.2);

/// The comparison the material program performs per fragment.
pub fn is_lit(stored_depth: f32, fragment_depth: f32) -> bool {
    stored_depth >= fragment_depth - SHADOW_BIAS
}

/// Shadow map coordinates of a world position: `xy` in texture space with
/// `y` pointing up, `z` the light depth, all in `[0, 1]` inside the frustum.
pub fn shadow_coordinates(world_to_light: Mat4, position: FVec3) -> FVec3 {
    let clip = world_to_light * position.extend(1.0);
    (clip.xyz() / clip.w + FVec3::ONE) * 0.5
}

/// Per-frame values shared by both passes. The light matrix is computed
/// once so the depth pass and the shadow lookup use identical bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub world_to_light: Mat4,
    pub view_proj: Mat4,
    pub view: Mat4,
    /// Unit vector towards the light, in view space.
    pub light_dir: FVec3,
    /// Camera position in view space.
    pub eye_pos: FVec3,
}

impl FrameUniforms {
    pub fn compute(camera: &Camera, light: &Light) -> Self {
        let view = camera.view();
        let light_dir = (view * light.direction().extend(0.0)).xyz().normalize_or_zero();
        let eye_pos = (view * DVec4::from((camera.position, 1.0))).xyz();
        Self {
            world_to_light: light.world_to_light_clip(),
            view_proj: camera.view_projection().as_mat4(),
            view: view.as_mat4(),
            light_dir: light_dir.as_vec3(),
            eye_pos: eye_pos.as_vec3(),
        }
    }
}

/// Line segments marking the light: a line to its look-at point and a
/// cross at each end.
pub fn light_marker(light: &Light) -> Mesh {
    let position = light.position.as_vec3();
    let look_at = light.look_at.as_vec3();
    let mut segments = vec![(position, look_at, LIGHT_MARKER_COLOR)];
    segments.extend(Mesh::cross_segments(position, 0.05, LIGHT_MARKER_COLOR));
    segments.extend(Mesh::cross_segments(look_at, 0.025, LIGHT_MARKER_COLOR));
    Mesh::lines(&segments)
}

/// Geometry that casts and receives shadows.
pub fn shadow_casters() -> Vec<(&'static str, Mesh)> {
    vec![
        (
            "sphere",
            Mesh::sphere(0.1, 32, 16, CASTER_COLOR)
                .transformed(Mat4::from_translation(FVec3::new(0.0, 0.0, 0.1))),
        ),
        (
            "cube",
            Mesh::cube(CASTER_COLOR).transformed(
                Mat4::from_translation(FVec3::new(0.18, -0.12, 0.04))
                    * Mat4::from_scale(FVec3::splat(0.08)),
            ),
        ),
        ("floor", Mesh::floor(0.3, CASTER_COLOR)),
    ]
}

/// Vertical quad showing the raw shadow map.
pub fn depth_view_quad() -> Mesh {
    Mesh::quad(
        [
            FVec3::new(-0.25, 0.5, 0.0),
            FVec3::new(0.25, 0.5, 0.0),
            FVec3::new(0.25, 0.5, 0.5),
            FVec3::new(-0.25, 0.5, 0.5),
        ],
        FVec3::NEG_Y,
        FVec3::ONE,
    )
}

/// Scene state and GPU resources of the shadow demo.
#[derive(Debug)]
pub struct ShadowScene {
    pub camera: Camera,
    pub light: Light,
    light_orbit: Option<LightOrbit>,
    shadow_map_size: (u32, u32),
    clear_color: [f64; 4],
    show_depth_view: bool,
    show_helpers: bool,
    material: ShaderProgram,
    depth: ShaderProgram,
    debug: ShaderProgram,
    lines: ShaderProgram,
    shadow_map: DepthTarget,
    casters: Vec<MeshHandle>,
    helpers: Vec<MeshHandle>,
    marker: Option<MeshHandle>,
    depth_quad: Option<MeshHandle>,
}

impl ShadowScene {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            camera: config.camera.clone(),
            light: config.light.clone(),
            light_orbit: config.light_orbit,
            shadow_map_size: config.shadow_map_size,
            clear_color: config.clear_color,
            show_depth_view: config.show_depth_view,
            show_helpers: config.show_helpers,
            material: ShaderProgram::new("material"),
            depth: ShaderProgram::new("depth"),
            debug: ShaderProgram::new("depth-view"),
            lines: ShaderProgram::new("lines"),
            shadow_map: DepthTarget::new(),
            casters: Vec::new(),
            helpers: Vec::new(),
            marker: None,
            depth_quad: None,
        }
    }

    /// Compiles the programs, allocates the shadow map and uploads the
    /// geometry. Shader and shadow map failures are logged and leave the
    /// scene running in a degraded state; only mesh upload errors are
    /// returned.
    pub fn init<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        library: &ShaderLibrary,
    ) -> Result<(), RenderError> {
        info!("compiling {}", library.describe());
        compile(&mut self.material, backend, library.material());
        compile(&mut self.depth, backend, library.depth());
        compile(&mut self.debug, backend, library.debug());
        compile(&mut self.lines, backend, library.lines());

        let (width, height) = self.shadow_map_size;
        self.shadow_map.init(backend, width, height);

        self.casters.clear();
        for (label, mesh) in shadow_casters() {
            self.casters.push(backend.create_mesh(label, &mesh)?);
        }

        self.helpers = vec![
            backend.create_mesh("axes", &Mesh::axes(0.5))?,
            backend.create_mesh("grid", &Mesh::grid(10, 0.1, -0.001, GRID_COLOR))?,
        ];
        self.marker = Some(backend.create_mesh("light-marker", &light_marker(&self.light))?);
        self.depth_quad = Some(backend.create_mesh("depth-view", &depth_view_quad())?);

        for err in backend.poll_errors() {
            error!("render backend: {err}");
        }
        Ok(())
    }

    /// Advances the scripted light to where it is `elapsed` after start.
    pub fn animate(&mut self, elapsed: Duration) {
        if let Some(orbit) = self.light_orbit {
            orbit.apply(&mut self.light, elapsed);
        }
    }

    /// Records one frame: the depth pass into the shadow map, then the
    /// color pass to the window.
    pub fn record(&mut self, commands: &mut CommandList) {
        let frame = FrameUniforms::compute(&self.camera, &self.light);

        if self.shadow_map.bind(commands) {
            commands.clear(None, Some(1.0));
            self.depth.set_uniform("view_proj", frame.world_to_light);
            self.depth.bind(commands);
            for caster in &self.casters {
                commands.draw(*caster);
            }
            self.depth.unbind(commands);
            self.shadow_map.unbind(commands);
        }

        commands.clear(Some(self.clear_color), Some(1.0));

        if self.show_helpers {
            self.lines.set_uniform("view_proj", frame.view_proj);
            self.lines.bind(commands);
            for helper in self.helpers.iter().chain(self.marker.iter()) {
                commands.draw(*helper);
            }
            self.lines.unbind(commands);
        }

        commands.bind_shadow_map(self.shadow_map.texture());

        if self.show_depth_view {
            if let Some(quad) = self.depth_quad {
                self.debug.set_uniform("view_proj", frame.view_proj);
                self.debug.bind(commands);
                commands.draw(quad);
                self.debug.unbind(commands);
            }
        }

        self.material.set_uniform("view_proj", frame.view_proj);
        self.material.set_uniform("view", frame.view);
        self.material.set_uniform("world_to_light", frame.world_to_light);
        self.material.set_uniform("light_dir", frame.light_dir);
        self.material.set_uniform("eye_pos", frame.eye_pos);
        self.material.set_uniform("shadow_bias", SHADOW_BIAS);
        self.material.bind(commands);
        for caster in &self.casters {
            commands.draw(*caster);
        }
        self.material.unbind(commands);
        commands.bind_shadow_map(None);
    }

    /// Records and submits one frame sized to the backend's window.
    pub fn render<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), RenderError> {
        let (width, height) = backend.window_size();
        self.camera.set_viewport(width, height);
        if let Some(marker) = self.marker {
            backend.update_mesh(marker, &light_marker(&self.light))?;
        }

        let mut commands = CommandList::new((width, height));
        self.record(&mut commands);
        let result = backend.submit(&commands);
        for err in backend.poll_errors() {
            error!("render backend: {err}");
        }
        result
    }

    pub fn toggle_depth_view(&mut self) -> bool {
        self.show_depth_view = !self.show_depth_view;
        debug!(
            "depth view {}",
            if self.show_depth_view { "on" } else { "off" }
        );
        self.show_depth_view
    }

    pub fn depth_view_enabled(&self) -> bool {
        self.show_depth_view
    }

    pub fn shadow_map(&self) -> &DepthTarget {
        &self.shadow_map
    }

    pub fn material(&self) -> &ShaderProgram {
        &self.material
    }

    pub fn depth_program(&self) -> &ShaderProgram {
        &self.depth
    }

    pub fn depth_view_program(&self) -> &ShaderProgram {
        &self.debug
    }

    pub fn lines_program(&self) -> &ShaderProgram {
        &self.lines
    }

    pub fn casters(&self) -> &[MeshHandle] {
        &self.casters
    }
}

fn compile<B: RenderBackend + ?Sized>(
    program: &mut ShaderProgram,
    backend: &mut B,
    sources: StageSources,
) {
    if !program.compile(backend, &sources.vertex, &sources.fragment) {
        error!("`{}` is unusable; its draws will be skipped", program.label());
    }
}
