//! Rendering backend seam.
//!
//! The shadow pipeline records a [`CommandList`] per frame and hands it to
//! a [`RenderBackend`]. The wgpu backend draws it on screen; the headless
//! backend validates it without a GPU.

pub mod commands;
pub mod depth_target;
pub mod headless;
pub mod native;

use thiserror::Error;

use crate::mesh::Mesh;
use crate::shader::ProgramInterface;

pub use commands::{Command, CommandList, Pass, RenderTarget, Viewport};
pub use depth_target::DepthTarget;
pub use headless::{DrawCall, FrameStats, HeadlessBackend, PassStats};
pub use native::WgpuBackend;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// Backend object for a linked shader program.
    ProgramHandle
);
handle!(
    /// Backend object for an offscreen depth target and its texture.
    TargetHandle
);
handle!(
    /// Backend vertex/index buffers.
    MeshHandle
);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("depth target {width}x{height} is incomplete: {reason}")]
    FramebufferIncomplete {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("backend error: {0}")]
    Backend(String),
    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: usize },
    #[error("frame ended with {0:?} still bound")]
    UnbalancedTarget(RenderTarget),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Both stages of a program that passed compilation and linking.
#[derive(Debug, Clone, Copy)]
pub struct LinkedProgram<'a> {
    pub label: &'a str,
    pub vertex_source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_source: &'a str,
    pub fragment_entry: &'a str,
    pub interface: &'a ProgramInterface,
}

/// Vertex attribute locations every [`Mesh`] provides.
pub const VERTEX_LOCATIONS: [u32; 4] = [0, 1, 2, 3];

/// Rejects programs reading a vertex attribute that meshes do not carry.
pub(crate) fn check_vertex_inputs(program: &LinkedProgram<'_>) -> Result<(), RenderError> {
    match program
        .interface
        .vertex_inputs
        .iter()
        .find(|location| !VERTEX_LOCATIONS.contains(location))
    {
        Some(location) => Err(RenderError::Backend(format!(
            "`{}` reads vertex attribute @location({location}) that meshes do not provide",
            program.label
        ))),
        None => Ok(()),
    }
}

/// GPU drawing surface used by the shadow pipeline.
pub trait RenderBackend {
    /// Creates the backend program for stages that already compiled and
    /// linked. Errors here are link failures.
    fn create_program(&mut self, program: &LinkedProgram<'_>) -> Result<ProgramHandle, RenderError>;

    /// Allocates a depth-only render target with a sampleable texture.
    fn create_depth_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, RenderError>;

    fn create_mesh(&mut self, label: &str, mesh: &Mesh) -> Result<MeshHandle, RenderError>;

    /// Replaces the contents of an existing mesh.
    fn update_mesh(&mut self, handle: MeshHandle, mesh: &Mesh) -> Result<(), RenderError>;

    /// Last size reported by the window.
    fn window_size(&self) -> (u32, u32);

    /// Executes one frame of recorded commands and presents it.
    fn submit(&mut self, commands: &CommandList) -> Result<(), RenderError>;

    /// Drains backend errors collected since the last poll.
    fn poll_errors(&mut self) -> Vec<String>;
}
