//! Directional-light shadow mapping demo.
//!
//! A scene is rendered twice per frame: once from the light into an
//! offscreen depth target, then from the camera with a material that
//! compares each fragment against the stored depth. The core records
//! backend-neutral command lists so the whole pipeline can run against the
//! headless backend in tests and `--summary-only` mode.

pub mod app;
pub mod camera;
pub mod config;
pub mod frame_timer;
pub mod input;
pub mod light;
pub mod math;
pub mod mesh;
pub mod orbit;
pub mod pipeline;
pub mod render;
pub mod shader;

pub use app::App;
pub use camera::Camera;
pub use config::{CliOptions, SceneConfig};
pub use frame_timer::FrameTimer;
pub use input::{InputEvent, InputState, KeyCode, MouseButton, NamedKey};
pub use light::{Light, LightOrbit};
pub use mesh::{Mesh, Topology, Vertex};
pub use orbit::OrbitController;
pub use pipeline::{FrameUniforms, ShadowScene};
pub use render::{
    CommandList, DepthTarget, HeadlessBackend, RenderBackend, RenderError, RenderTarget,
    Viewport, WgpuBackend,
};
pub use shader::{ShaderError, ShaderLibrary, ShaderProgram, ShaderStage, UniformValue};
