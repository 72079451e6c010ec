//! Stage compilation, interface reflection and program linking with naga.

use std::collections::HashMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Module, Scalar, TypeInner, VectorSize};

use super::{ShaderError, ShaderStage, UniformKind};

/// Bind group holding a program's uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Bind group holding the shadow map texture and sampler.
pub const SHADOW_MAP_GROUP: u32 = 1;

/// Location and type of one member of a program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: usize,
    pub kind: UniformKind,
}

/// What the backend needs to know about a linked program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramInterface {
    /// Size in bytes of the uniform block, zero when there is none.
    pub uniform_size: usize,
    pub uniforms: HashMap<String, UniformSlot>,
    /// Vertex attribute locations consumed by the vertex stage.
    pub vertex_inputs: Vec<u32>,
    /// Whether any stage samples the shadow map group.
    pub samples_shadow_map: bool,
    /// Whether the fragment stage writes a color output.
    pub writes_color: bool,
}

/// A stage that parsed and validated.
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub module: Module,
    pub entry_point: String,
}

impl CompiledStage {
    fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|entry| entry.name == self.entry_point)
    }
}

/// Parses and validates one WGSL stage, returning compiler diagnostics on
/// failure.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, ShaderError> {
    if source.trim().is_empty() {
        return Err(ShaderError::EmptySource { stage });
    }

    let module = naga::front::wgsl::parse_str(source).map_err(|err| ShaderError::Compile {
        stage,
        message: err.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| ShaderError::Compile {
            stage,
            message: err.emit_to_string(source),
        })?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage.naga_stage())
        .map(|entry| entry.name.clone())
        .ok_or_else(|| ShaderError::Compile {
            stage,
            message: format!("no @{stage} entry point"),
        })?;

    Ok(CompiledStage {
        stage,
        module,
        entry_point,
    })
}

/// Checks that two stages form a program and reflects its interface.
pub fn link(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<ProgramInterface, ShaderError> {
    let vertex_entry = vertex
        .entry()
        .ok_or_else(|| ShaderError::Link("vertex entry point vanished".into()))?;
    let fragment_entry = fragment
        .entry()
        .ok_or_else(|| ShaderError::Link("fragment entry point vanished".into()))?;

    let outputs = result_locations(&vertex.module, &vertex_entry.function);
    for (location, ty) in argument_locations(&fragment.module, &fragment_entry.function) {
        match outputs.iter().find(|(out, _)| *out == location) {
            None => {
                return Err(ShaderError::Link(format!(
                    "fragment input @location({location}) is not written by the vertex stage"
                )))
            }
            Some((_, out_ty)) if *out_ty != ty => {
                return Err(ShaderError::Link(format!(
                    "@location({location}) has type {out_ty:?} in the vertex stage but {ty:?} in the fragment stage"
                )))
            }
            Some(_) => {}
        }
    }

    let block = merge_blocks(
        uniform_block(&vertex.module),
        uniform_block(&fragment.module),
    )?;

    let mut vertex_inputs: Vec<u32> = argument_locations(&vertex.module, &vertex_entry.function)
        .into_iter()
        .map(|(location, _)| location)
        .collect();
    vertex_inputs.sort_unstable();

    Ok(ProgramInterface {
        uniform_size: block.size,
        uniforms: block.slots,
        vertex_inputs,
        samples_shadow_map: uses_group(&vertex.module, SHADOW_MAP_GROUP)
            || uses_group(&fragment.module, SHADOW_MAP_GROUP),
        writes_color: !result_locations(&fragment.module, &fragment_entry.function).is_empty(),
    })
}

#[derive(Debug, Default)]
struct UniformBlock {
    size: usize,
    slots: HashMap<String, UniformSlot>,
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match *inner {
        TypeInner::Scalar(scalar) if scalar == Scalar::F32 => Some(UniformKind::Scalar),
        TypeInner::Vector {
            size: VectorSize::Tri,
            scalar,
        } if scalar == Scalar::F32 => Some(UniformKind::Vec3),
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if scalar == Scalar::F32 => Some(UniformKind::Vec4),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == Scalar::F32 => Some(UniformKind::Mat4),
        _ => None,
    }
}

fn uniform_block(module: &Module) -> Option<UniformBlock> {
    let (_, variable) = module.global_variables.iter().find(|(_, variable)| {
        variable.space == AddressSpace::Uniform
            && variable
                .binding
                .as_ref()
                .is_some_and(|binding| binding.group == UNIFORM_GROUP && binding.binding == 0)
    })?;

    let mut block = UniformBlock::default();
    match &module.types[variable.ty].inner {
        TypeInner::Struct { members, span } => {
            block.size = *span as usize;
            for member in members {
                let (Some(name), Some(kind)) = (
                    member.name.as_ref(),
                    uniform_kind(&module.types[member.ty].inner),
                ) else {
                    continue;
                };
                block.slots.insert(
                    name.clone(),
                    UniformSlot {
                        offset: member.offset as usize,
                        kind,
                    },
                );
            }
        }
        other => {
            let kind = uniform_kind(other)?;
            block.size = kind.size().next_multiple_of(16);
            if let Some(name) = variable.name.as_ref() {
                block.slots.insert(name.clone(), UniformSlot { offset: 0, kind });
            }
        }
    }
    Some(block)
}

fn merge_blocks(
    vertex: Option<UniformBlock>,
    fragment: Option<UniformBlock>,
) -> Result<UniformBlock, ShaderError> {
    match (vertex, fragment) {
        (Some(mut vertex), Some(fragment)) => {
            if vertex.size != fragment.size {
                return Err(ShaderError::Link(format!(
                    "uniform block is {} bytes in the vertex stage but {} bytes in the fragment stage",
                    vertex.size, fragment.size
                )));
            }
            for (name, slot) in fragment.slots {
                match vertex.slots.get(&name) {
                    Some(existing) if *existing != slot => {
                        return Err(ShaderError::Link(format!(
                            "uniform `{name}` is declared differently by the two stages"
                        )))
                    }
                    Some(_) => {}
                    None => {
                        vertex.slots.insert(name, slot);
                    }
                }
            }
            Ok(vertex)
        }
        (Some(block), None) | (None, Some(block)) => Ok(block),
        (None, None) => Ok(UniformBlock::default()),
    }
}

fn uses_group(module: &Module, group: u32) -> bool {
    module
        .global_variables
        .iter()
        .any(|(_, variable)| variable.binding.as_ref().is_some_and(|b| b.group == group))
}

fn location_of(binding: Option<&Binding>) -> Option<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => Some(*location),
        _ => None,
    }
}

/// `@location` bindings of a type used directly or as a struct of members.
fn collect_locations(
    module: &Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut Vec<(u32, TypeInner)>,
) {
    if let Some(location) = location_of(binding) {
        out.push((location, module.types[ty].inner.clone()));
        return;
    }
    if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
        for member in members {
            if let Some(location) = location_of(member.binding.as_ref()) {
                out.push((location, module.types[member.ty].inner.clone()));
            }
        }
    }
}

fn argument_locations(module: &Module, function: &naga::Function) -> Vec<(u32, TypeInner)> {
    let mut locations = Vec::new();
    for argument in &function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut locations);
    }
    locations
}

fn result_locations(module: &Module, function: &naga::Function) -> Vec<(u32, TypeInner)> {
    let mut locations = Vec::new();
    if let Some(result) = &function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut locations);
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
        struct Globals {
            view_proj: mat4x4<f32>,
            tint: vec3<f32>,
            strength: f32,
        }

        @group(0) @binding(0)
        var<uniform> globals: Globals;

        struct VertexOutput {
            @builtin(position) position: vec4<f32>,
            @location(0) color: vec3<f32>,
        }

        @vertex
        fn vs_main(@location(0) position: vec3<f32>, @location(2) color: vec3<f32>) -> VertexOutput {
            var out: VertexOutput;
            out.position = globals.view_proj * vec4<f32>(position, 1.0);
            out.color = color * globals.tint;
            return out;
        }
    "#;

    const FRAGMENT: &str = r#"
        struct Globals {
            view_proj: mat4x4<f32>,
            tint: vec3<f32>,
            strength: f32,
        }

        @group(0) @binding(0)
        var<uniform> globals: Globals;

        @fragment
        fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
            return vec4<f32>(color * globals.strength, 1.0);
        }
    "#;

    #[test]
    fn links_matching_stages() {
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX).unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, FRAGMENT).unwrap();
        let interface = link(&vertex, &fragment).unwrap();

        assert_eq!(interface.uniform_size, 80);
        assert_eq!(
            interface.uniforms["view_proj"],
            UniformSlot {
                offset: 0,
                kind: UniformKind::Mat4
            }
        );
        assert_eq!(interface.uniforms["tint"].offset, 64);
        assert_eq!(interface.uniforms["strength"].offset, 76);
        assert_eq!(interface.vertex_inputs, vec![0, 2]);
        assert!(interface.writes_color);
        assert!(!interface.samples_shadow_map);
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let err = compile_stage(ShaderStage::Fragment, VERTEX).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let fragment = FRAGMENT.replace("@location(0) color", "@location(5) color");
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX).unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, &fragment).unwrap();
        let err = link(&vertex, &fragment).unwrap_err();
        assert!(err.to_string().contains("@location(5)"));
    }

    #[test]
    fn mismatched_uniform_blocks_fail_to_link() {
        let fragment = FRAGMENT.replace("strength: f32,", "strength: f32,\n            extra: vec4<f32>,");
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX).unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, &fragment).unwrap();
        assert!(matches!(link(&vertex, &fragment), Err(ShaderError::Link(_))));
    }
}
