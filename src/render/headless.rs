//! GPU-less backend that checks recorded frames and keeps statistics about
//! them. Used by the tests and by `--summary-only`.

use log::{debug, trace};

use super::depth_target::validate_size;
use super::check_vertex_inputs;
use super::{
    Command, CommandList, LinkedProgram, MeshHandle, ProgramHandle, RenderBackend, RenderError,
    RenderTarget, TargetHandle, Viewport,
};
use crate::mesh::{Mesh, Topology};
use crate::shader::ProgramInterface;

/// Texture size limit assumed when none is given.
pub const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

#[derive(Debug, Clone)]
struct ProgramRecord {
    label: String,
    interface: ProgramInterface,
}

#[derive(Debug, Clone)]
struct MeshRecord {
    label: String,
    topology: Topology,
}

/// One draw as the backend would have issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub mesh: MeshHandle,
    /// Texture bound for shadow lookups when the program samples one;
    /// `Some(None)` is the always-lit fallback.
    pub shadow_map: Option<Option<TargetHandle>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassStats {
    pub target: RenderTarget,
    pub viewport: Viewport,
    pub color_writes: bool,
    pub cleared_color: bool,
    pub cleared_depth: bool,
    pub draws: Vec<DrawCall>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub passes: Vec<PassStats>,
    /// Draws dropped because no program was current.
    pub skipped_draws: usize,
}

impl FrameStats {
    pub fn draw_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.draws.len()).sum()
    }
}

#[derive(Debug)]
pub struct HeadlessBackend {
    window: Viewport,
    max_texture_dimension: u32,
    programs: Vec<ProgramRecord>,
    targets: Vec<Viewport>,
    meshes: Vec<MeshRecord>,
    frames: u64,
    last_frame: Option<FrameStats>,
    last_commands: Option<CommandList>,
    errors: Vec<String>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_max_texture_dimension(width, height, DEFAULT_MAX_TEXTURE_DIMENSION)
    }

    pub fn with_max_texture_dimension(width: u32, height: u32, max_texture_dimension: u32) -> Self {
        Self {
            window: Viewport::new(width, height),
            max_texture_dimension,
            programs: Vec::new(),
            targets: Vec::new(),
            meshes: Vec::new(),
            frames: 0,
            last_frame: None,
            last_commands: None,
            errors: Vec::new(),
        }
    }

    /// Number of frames submitted successfully.
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }

    pub fn last_commands(&self) -> Option<&CommandList> {
        self.last_commands.as_ref()
    }

    fn program(&self, handle: ProgramHandle) -> Result<&ProgramRecord, RenderError> {
        self.programs
            .get(handle.index())
            .ok_or(RenderError::UnknownHandle {
                kind: "program",
                index: handle.index(),
            })
    }

    fn check_target(&self, handle: TargetHandle) -> Result<Viewport, RenderError> {
        self.targets
            .get(handle.index())
            .copied()
            .ok_or(RenderError::UnknownHandle {
                kind: "depth target",
                index: handle.index(),
            })
    }

    fn check_mesh(&self, handle: MeshHandle) -> Result<&MeshRecord, RenderError> {
        self.meshes.get(handle.index()).ok_or(RenderError::UnknownHandle {
            kind: "mesh",
            index: handle.index(),
        })
    }

    fn replay(&self, commands: &CommandList) -> Result<FrameStats, RenderError> {
        let mut stats = FrameStats::default();
        let mut viewport = commands.window_viewport();
        let mut color_writes = true;
        let mut program: Option<ProgramHandle> = None;
        let mut shadow_map: Option<TargetHandle> = None;

        for pass in commands.passes() {
            if let RenderTarget::Depth(handle) = pass.target {
                self.check_target(handle)?;
            }
            let mut draws = Vec::new();
            for command in pass.commands {
                match command {
                    Command::SetViewport(next) => viewport = *next,
                    Command::SetColorWrites(enabled) => color_writes = *enabled,
                    Command::UseProgram {
                        program: handle,
                        uniforms,
                    } => {
                        let record = self.program(*handle)?;
                        if uniforms.len() != record.interface.uniform_size {
                            return Err(RenderError::Backend(format!(
                                "`{}` expects {} uniform bytes, got {}",
                                record.label,
                                record.interface.uniform_size,
                                uniforms.len()
                            )));
                        }
                        program = Some(*handle);
                    }
                    Command::ReleaseProgram => program = None,
                    Command::BindShadowMap(target) => {
                        if let Some(handle) = target {
                            self.check_target(*handle)?;
                        }
                        shadow_map = *target;
                    }
                    Command::Draw(mesh) => {
                        self.check_mesh(*mesh)?;
                        let Some(handle) = program else {
                            stats.skipped_draws += 1;
                            continue;
                        };
                        let samples = self.program(handle)?.interface.samples_shadow_map;
                        if samples
                            && shadow_map.is_some_and(|map| pass.target == RenderTarget::Depth(map))
                        {
                            return Err(RenderError::Backend(
                                "shadow map sampled while it is the render target".into(),
                            ));
                        }
                        draws.push(DrawCall {
                            program: handle,
                            mesh: *mesh,
                            shadow_map: samples.then_some(shadow_map),
                        });
                    }
                    Command::BindTarget(_) | Command::Clear { .. } => {}
                }
            }
            if pass.is_visible() {
                stats.passes.push(PassStats {
                    target: pass.target,
                    viewport,
                    color_writes,
                    cleared_color: pass.clear_color.is_some(),
                    cleared_depth: pass.clear_depth.is_some(),
                    draws,
                });
            }
        }

        if commands.active_target() != RenderTarget::Window {
            return Err(RenderError::UnbalancedTarget(commands.active_target()));
        }
        Ok(stats)
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_program(&mut self, program: &LinkedProgram<'_>) -> Result<ProgramHandle, RenderError> {
        check_vertex_inputs(program)?;
        let handle = ProgramHandle::from_index(self.programs.len());
        self.programs.push(ProgramRecord {
            label: program.label.to_string(),
            interface: program.interface.clone(),
        });
        Ok(handle)
    }

    fn create_depth_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, RenderError> {
        validate_size(width, height, self.max_texture_dimension)?;
        debug!("headless depth target `{label}` {width}x{height}");
        let handle = TargetHandle::from_index(self.targets.len());
        self.targets.push(Viewport::new(width, height));
        Ok(handle)
    }

    fn create_mesh(&mut self, label: &str, mesh: &Mesh) -> Result<MeshHandle, RenderError> {
        let handle = MeshHandle::from_index(self.meshes.len());
        self.meshes.push(MeshRecord {
            label: label.to_string(),
            topology: mesh.topology,
        });
        Ok(handle)
    }

    fn update_mesh(&mut self, handle: MeshHandle, mesh: &Mesh) -> Result<(), RenderError> {
        let record = self
            .meshes
            .get(handle.index())
            .ok_or(RenderError::UnknownHandle {
                kind: "mesh",
                index: handle.index(),
            })?;
        if record.topology != mesh.topology {
            return Err(RenderError::Backend(format!(
                "mesh `{}` cannot change topology",
                record.label
            )));
        }
        Ok(())
    }

    fn window_size(&self) -> (u32, u32) {
        (self.window.width, self.window.height)
    }

    fn submit(&mut self, commands: &CommandList) -> Result<(), RenderError> {
        let stats = match self.replay(commands) {
            Ok(stats) => stats,
            Err(err) => {
                self.errors.push(err.to_string());
                return Err(err);
            }
        };
        self.frames += 1;
        trace!(
            "headless frame {}: {} passes, {} draws",
            self.frames,
            stats.passes.len(),
            stats.draw_count()
        );
        self.last_frame = Some(stats);
        self.last_commands = Some(commands.clone());
        Ok(())
    }

    fn poll_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn rejects_unknown_handles() {
        let mut backend = HeadlessBackend::new(320, 240);
        let mut commands = CommandList::new(backend.window_size());
        commands.draw(MeshHandle::from_index(7));
        let err = backend.submit(&commands).unwrap_err();
        assert!(matches!(err, RenderError::UnknownHandle { kind: "mesh", index: 7 }));
        assert_eq!(backend.poll_errors().len(), 1);
        assert!(backend.poll_errors().is_empty());
    }

    #[test]
    fn frame_must_end_on_window() {
        let mut backend = HeadlessBackend::new(320, 240);
        let target = backend.create_depth_target("t", 64, 64).unwrap();
        let mut commands = CommandList::new(backend.window_size());
        commands.bind_target(RenderTarget::Depth(target));
        assert!(matches!(
            backend.submit(&commands),
            Err(RenderError::UnbalancedTarget(RenderTarget::Depth(_)))
        ));
        assert_eq!(backend.frames_rendered(), 0);
    }

    #[test]
    fn draws_without_program_are_skipped() {
        let mut backend = HeadlessBackend::new(320, 240);
        let mesh = backend.create_mesh("cube", &Mesh::cube(Vec3::ONE)).unwrap();
        let mut commands = CommandList::new(backend.window_size());
        commands.clear(Some([0.0; 4]), Some(1.0));
        commands.draw(mesh);
        backend.submit(&commands).unwrap();

        let frame = backend.last_frame().unwrap();
        assert_eq!(frame.skipped_draws, 1);
        assert_eq!(frame.passes.len(), 1);
        assert!(frame.passes[0].draws.is_empty());
        assert!(frame.passes[0].cleared_color);
    }

    fn linked(interface: &ProgramInterface) -> LinkedProgram<'_> {
        LinkedProgram {
            label: "extra-attribute",
            vertex_source: "",
            vertex_entry: "vs_main",
            fragment_source: "",
            fragment_entry: "fs_main",
            interface,
        }
    }

    #[test]
    fn programs_reading_missing_attributes_are_rejected() {
        let mut backend = HeadlessBackend::new(320, 240);
        let mut interface = ProgramInterface {
            vertex_inputs: vec![0, 2],
            ..ProgramInterface::default()
        };
        assert!(backend.create_program(&linked(&interface)).is_ok());

        interface.vertex_inputs.push(7);
        let err = backend.create_program(&linked(&interface)).unwrap_err();
        assert!(err.to_string().contains("@location(7)"));
    }

    #[test]
    fn oversized_targets_are_incomplete() {
        let mut backend = HeadlessBackend::with_max_texture_dimension(320, 240, 512);
        assert!(matches!(
            backend.create_depth_target("big", 1024, 1024),
            Err(RenderError::FramebufferIncomplete { .. })
        ));
    }
}
