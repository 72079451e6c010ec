//! Shader programs: two compiled stages, a linked interface and a CPU copy
//! of the uniform block that is snapshotted into the command stream on bind.

pub mod reflect;
pub mod source;

use std::fmt;

use glam::{Mat4, Vec3, Vec4};
use log::{error, info, warn};
use thiserror::Error;

use crate::render::{CommandList, LinkedProgram, ProgramHandle, RenderBackend};

pub use reflect::{ProgramInterface, UniformSlot};
pub use source::{ShaderLibrary, StageSources};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn naga_stage(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader has nothing to compile")]
    EmptySource { stage: ShaderStage },
    #[error("{stage} shader failed to compile:\n{message}")]
    Compile { stage: ShaderStage, message: String },
    #[error("program failed to link: {0}")]
    Link(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Scalar,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    /// Bytes written for a value of this kind.
    pub const fn size(self) -> usize {
        match self {
            UniformKind::Scalar => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Scalar(_) => UniformKind::Scalar,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write(&self, out: &mut [u8]) {
        match self {
            UniformValue::Scalar(value) => out.copy_from_slice(bytemuck::bytes_of(value)),
            UniformValue::Vec3(value) => out.copy_from_slice(bytemuck::cast_slice(&value.to_array())),
            UniformValue::Vec4(value) => out.copy_from_slice(bytemuck::cast_slice(&value.to_array())),
            UniformValue::Mat4(value) => {
                out.copy_from_slice(bytemuck::cast_slice(&value.to_cols_array()))
            }
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Scalar(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value)
    }
}

/// A vertex/fragment program pair.
///
/// A program that failed to compile or link stays in the scene; binding it
/// records nothing, so draws issued after it fall through to whatever was
/// current before.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    handle: Option<ProgramHandle>,
    interface: ProgramInterface,
    uniform_data: Vec<u8>,
    diagnostics: Vec<String>,
}

impl ShaderProgram {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            handle: None,
            interface: ProgramInterface::default(),
            uniform_data: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Compiles both stages and links them. Each failing stage is logged
    /// with its compiler output. A stage that fails to parse leaves no
    /// module behind, so linking only runs once both stages compiled and a
    /// failed stage never adds a link diagnostic. Returns whether the
    /// program is usable.
    pub fn compile<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        vertex_source: &str,
        fragment_source: &str,
    ) -> bool {
        self.handle = None;
        self.interface = ProgramInterface::default();
        self.uniform_data.clear();
        self.diagnostics.clear();

        let vertex = reflect::compile_stage(ShaderStage::Vertex, vertex_source);
        let fragment = reflect::compile_stage(ShaderStage::Fragment, fragment_source);
        let (vertex, fragment) = match (vertex, fragment) {
            (Ok(vertex), Ok(fragment)) => (vertex, fragment),
            (vertex, fragment) => {
                for err in [vertex.err(), fragment.err()].into_iter().flatten() {
                    self.report(err.to_string());
                }
                return false;
            }
        };

        let interface = match reflect::link(&vertex, &fragment) {
            Ok(interface) => interface,
            Err(err) => {
                self.report(err.to_string());
                return false;
            }
        };

        let linked = LinkedProgram {
            label: &self.label,
            vertex_source,
            vertex_entry: &vertex.entry_point,
            fragment_source,
            fragment_entry: &fragment.entry_point,
            interface: &interface,
        };
        match backend.create_program(&linked) {
            Ok(handle) => {
                info!(
                    "linked `{}` ({} uniform bytes)",
                    self.label, interface.uniform_size
                );
                self.uniform_data = vec![0; interface.uniform_size];
                self.interface = interface;
                self.handle = Some(handle);
                true
            }
            Err(err) => {
                self.report(format!("program failed to link: {err}"));
                false
            }
        }
    }

    fn report(&mut self, message: String) {
        error!("`{}`: {message}", self.label);
        self.diagnostics.push(message);
    }

    /// Makes the program current with the uniform values set so far. Does
    /// nothing when the program is not linked.
    pub fn bind(&self, commands: &mut CommandList) {
        if let Some(handle) = self.handle {
            commands.use_program(handle, self.uniform_data.clone());
        }
    }

    pub fn unbind(&self, commands: &mut CommandList) {
        if self.handle.is_some() {
            commands.release_program();
        }
    }

    /// Writes a named uniform. Names the program does not use are ignored,
    /// matching how unused uniforms vanish from a linked program.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        let Some(slot) = self.interface.uniforms.get(name).copied() else {
            return;
        };
        if slot.kind != value.kind() {
            warn!(
                "`{}`: uniform `{name}` is {:?}, ignoring {:?} value",
                self.label,
                slot.kind,
                value.kind()
            );
            return;
        }
        let end = slot.offset + slot.kind.size();
        if let Some(bytes) = self.uniform_data.get_mut(slot.offset..end) {
            value.write(bytes);
        }
    }

    /// Reads back a uniform as it will be uploaded.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        let slot = self.interface.uniforms.get(name)?;
        let bytes = self
            .uniform_data
            .get(slot.offset..slot.offset + slot.kind.size())?;
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(match slot.kind {
            UniformKind::Scalar => UniformValue::Scalar(floats[0]),
            UniformKind::Vec3 => UniformValue::Vec3(Vec3::from_slice(&floats)),
            UniformKind::Vec4 => UniformValue::Vec4(Vec4::from_slice(&floats)),
            UniformKind::Mat4 => UniformValue::Mat4(Mat4::from_cols_slice(&floats)),
        })
    }

    pub fn is_linked(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    /// Compiler and linker messages from the last `compile`.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Command, HeadlessBackend};

    fn lines_program(backend: &mut HeadlessBackend) -> ShaderProgram {
        let library = ShaderLibrary::embedded();
        let sources = library.lines();
        let mut program = ShaderProgram::new("lines");
        assert!(program.compile(backend, &sources.vertex, &sources.fragment));
        program
    }

    #[test]
    fn uniforms_are_snapshotted_on_bind() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut program = lines_program(&mut backend);
        let matrix = Mat4::from_scale(Vec3::splat(2.0));
        program.set_uniform("view_proj", matrix);
        assert_eq!(program.uniform("view_proj"), Some(UniformValue::Mat4(matrix)));

        let mut commands = CommandList::new((64, 64));
        program.bind(&mut commands);
        program.set_uniform("view_proj", Mat4::IDENTITY);

        let Command::UseProgram { uniforms, .. } = &commands.commands()[0] else {
            panic!("expected UseProgram");
        };
        assert_eq!(&uniforms[..64], bytemuck::bytes_of(&matrix.to_cols_array()));
    }

    #[test]
    fn unknown_and_mistyped_uniforms_are_ignored() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut program = lines_program(&mut backend);
        program.set_uniform("no_such_uniform", 1.0);
        program.set_uniform("view_proj", 1.0);
        assert_eq!(program.uniform("view_proj"), Some(UniformValue::Mat4(Mat4::ZERO)));
    }

    #[test]
    fn broken_fragment_stage_leaves_program_unusable() {
        let mut backend = HeadlessBackend::new(64, 64);
        let sources = ShaderLibrary::embedded().lines();
        let mut program = ShaderProgram::new("broken");
        let compiled = program.compile(&mut backend, &sources.vertex, "@fragment fn fs_main( {");
        assert!(!compiled);
        assert!(!program.is_linked());
        assert_eq!(program.diagnostics().len(), 1);
        assert!(program.diagnostics()[0].contains("fragment"));

        let mut commands = CommandList::new((64, 64));
        program.bind(&mut commands);
        program.unbind(&mut commands);
        assert!(commands.is_empty());
    }

    #[test]
    fn both_failing_stages_are_reported() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut program = ShaderProgram::new("empty");
        assert!(!program.compile(&mut backend, "", "   "));
        assert_eq!(program.diagnostics().len(), 2);
        assert!(program.diagnostics()[0].contains("nothing to compile"));
        assert!(program
            .diagnostics()
            .iter()
            .all(|message| !message.contains("link")));
    }
}
