//! Where shader stage sources come from.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

const EMBEDDED: &[(&str, &str)] = &[
    ("material.vert.wgsl", include_str!("../../shaders/material.vert.wgsl")),
    ("material.frag.wgsl", include_str!("../../shaders/material.frag.wgsl")),
    ("depth.vert.wgsl", include_str!("../../shaders/depth.vert.wgsl")),
    ("depth.frag.wgsl", include_str!("../../shaders/depth.frag.wgsl")),
    ("debug.vert.wgsl", include_str!("../../shaders/debug.vert.wgsl")),
    ("debug.frag.wgsl", include_str!("../../shaders/debug.frag.wgsl")),
    ("lines.vert.wgsl", include_str!("../../shaders/lines.vert.wgsl")),
    ("lines.frag.wgsl", include_str!("../../shaders/lines.frag.wgsl")),
];

/// Vertex and fragment source text of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}

/// Reads a whole source file. A file that cannot be read yields an empty
/// source after a warning; compiling it then reports the stage as empty.
pub fn read_source(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            warn!("could not read shader {}: {err}", path.display());
            String::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderLibrary {
    /// Sources compiled into the binary.
    Embedded,
    /// `<name>.vert.wgsl` / `<name>.frag.wgsl` files in a directory.
    Directory(PathBuf),
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::Embedded
    }
}

impl ShaderLibrary {
    pub fn embedded() -> Self {
        Self::Embedded
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::Directory(dir.into())
    }

    pub fn describe(&self) -> String {
        match self {
            ShaderLibrary::Embedded => "built-in shaders".to_string(),
            ShaderLibrary::Directory(dir) => format!("shaders from {}", dir.display()),
        }
    }

    fn file(&self, name: &str) -> String {
        match self {
            ShaderLibrary::Embedded => EMBEDDED
                .iter()
                .find(|(file, _)| *file == name)
                .map(|(_, source)| source.to_string())
                .unwrap_or_default(),
            ShaderLibrary::Directory(dir) => read_source(&dir.join(name)),
        }
    }

    /// Sources of the program called `name`.
    pub fn program(&self, name: &str) -> StageSources {
        StageSources {
            vertex: self.file(&format!("{name}.vert.wgsl")),
            fragment: self.file(&format!("{name}.frag.wgsl")),
        }
    }

    /// Lit, shadowed surfaces.
    pub fn material(&self) -> StageSources {
        self.program("material")
    }

    /// Depth-only pass from the light.
    pub fn depth(&self) -> StageSources {
        self.program("depth")
    }

    /// Shadow map visualisation quad.
    pub fn debug(&self) -> StageSources {
        self.program("debug")
    }

    /// Unlit helper lines.
    pub fn lines(&self) -> StageSources {
        self.program("lines")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::reflect::{compile_stage, link};
    use crate::shader::ShaderStage;

    #[test]
    fn embedded_programs_compile_and_link() {
        let library = ShaderLibrary::embedded();
        for name in ["material", "depth", "debug", "lines"] {
            let sources = library.program(name);
            let vertex = compile_stage(ShaderStage::Vertex, &sources.vertex).unwrap();
            let fragment = compile_stage(ShaderStage::Fragment, &sources.fragment).unwrap();
            link(&vertex, &fragment).unwrap_or_else(|err| panic!("{name}: {err}"));
        }
    }

    #[test]
    fn material_interface() {
        let sources = ShaderLibrary::embedded().material();
        let vertex = compile_stage(ShaderStage::Vertex, &sources.vertex).unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, &sources.fragment).unwrap();
        let interface = link(&vertex, &fragment).unwrap();
        assert!(interface.samples_shadow_map);
        assert!(interface.writes_color);
        for name in ["view_proj", "view", "world_to_light", "light_dir", "shadow_bias", "eye_pos"] {
            assert!(interface.uniforms.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn depth_program_writes_no_color() {
        let sources = ShaderLibrary::embedded().depth();
        let vertex = compile_stage(ShaderStage::Vertex, &sources.vertex).unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, &sources.fragment).unwrap();
        let interface = link(&vertex, &fragment).unwrap();
        assert!(!interface.writes_color);
        assert!(!interface.samples_shadow_map);
        assert_eq!(interface.vertex_inputs, vec![0]);
    }

    #[test]
    fn directory_library_reads_files_and_tolerates_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lines.vert.wgsl"), "// vertex").unwrap();

        let library = ShaderLibrary::from_dir(dir.path());
        let sources = library.lines();
        assert_eq!(sources.vertex, "// vertex");
        assert!(sources.fragment.is_empty());
    }
}
