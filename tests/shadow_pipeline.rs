use std::fs;
use std::path::Path;
use std::time::Duration;

use shadow_mapping::pipeline::SHADOW_BIAS;
use shadow_mapping::render::{Command, HeadlessBackend, RenderTarget, Viewport};
use shadow_mapping::{App, FrameUniforms, SceneConfig, ShaderLibrary, ShaderProgram};

fn render_frames(config: &SceneConfig, library: &ShaderLibrary, frames: u32) -> (App, HeadlessBackend) {
    let mut backend = HeadlessBackend::new(800, 600);
    let mut app = App::new(config);
    app.init(&mut backend, library).unwrap();
    for frame in 0..frames {
        app.frame_at(&mut backend, Duration::from_millis(250) * frame)
            .unwrap();
    }
    (app, backend)
}

fn uniforms_of<'a>(backend: &'a HeadlessBackend, program: &ShaderProgram) -> Vec<&'a [u8]> {
    let handle = program.handle().unwrap();
    backend
        .last_commands()
        .unwrap()
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::UseProgram { program, uniforms } if *program == handle => {
                Some(uniforms.as_slice())
            }
            _ => None,
        })
        .collect()
}

fn slot_bytes<'a>(uniforms: &'a [u8], program: &ShaderProgram, name: &str) -> &'a [u8] {
    let slot = program.interface().uniforms[name];
    &uniforms[slot.offset..slot.offset + slot.kind.size()]
}

#[test]
fn depth_pass_and_shadow_lookup_share_the_light_matrix() {
    let (app, backend) = render_frames(&SceneConfig::default(), &ShaderLibrary::embedded(), 3);
    let scene = &app.scene;

    let depth = uniforms_of(&backend, scene.depth_program());
    let material = uniforms_of(&backend, scene.material());
    assert_eq!(depth.len(), 1);
    assert_eq!(material.len(), 1);

    let light_in_depth_pass = slot_bytes(depth[0], scene.depth_program(), "view_proj");
    let light_in_material = slot_bytes(material[0], scene.material(), "world_to_light");
    assert_eq!(light_in_depth_pass, light_in_material);

    let expected = FrameUniforms::compute(&scene.camera, &scene.light).world_to_light;
    assert_eq!(
        light_in_material,
        bytemuck::cast_slice::<f32, u8>(&expected.to_cols_array())
    );

    let bias = slot_bytes(material[0], scene.material(), "shadow_bias");
    assert_eq!(bias, SHADOW_BIAS.to_ne_bytes());
    assert_eq!(SHADOW_BIAS, 0.005);
}

#[test]
fn depth_pass_uses_shadow_map_viewport_and_color_pass_the_window() {
    let (app, backend) = render_frames(&SceneConfig::default(), &ShaderLibrary::embedded(), 1);
    let frame = backend.last_frame().unwrap();
    assert_eq!(frame.passes.len(), 2);

    let depth = &frame.passes[0];
    let shadow_map = app.scene.shadow_map().texture().unwrap();
    assert_eq!(depth.target, RenderTarget::Depth(shadow_map));
    assert_eq!(depth.viewport, Viewport::new(1024, 1024));
    assert!(!depth.color_writes);
    assert!(depth.cleared_depth);
    assert_eq!(depth.draws.len(), app.scene.casters().len());

    let color = &frame.passes[1];
    assert_eq!(color.target, RenderTarget::Window);
    assert_eq!(color.viewport, Viewport::new(800, 600));
    assert!(color.color_writes);
    assert!(color.cleared_color);
    let material = app.scene.material().handle().unwrap();
    let shaded: Vec<_> = color
        .draws
        .iter()
        .filter(|draw| draw.program == material)
        .collect();
    assert_eq!(shaded.len(), app.scene.casters().len());
    assert!(shaded
        .iter()
        .all(|draw| draw.shadow_map == Some(Some(shadow_map))));
    assert_eq!(frame.skipped_draws, 0);
}

#[test]
fn incomplete_shadow_map_renders_unshadowed() {
    let config = SceneConfig {
        shadow_map_size: (0, 0),
        ..SceneConfig::default()
    };
    let (app, backend) = render_frames(&config, &ShaderLibrary::embedded(), 2);
    assert!(!app.scene.shadow_map().is_complete());
    assert_eq!(backend.frames_rendered(), 2);

    let frame = backend.last_frame().unwrap();
    assert!(frame
        .passes
        .iter()
        .all(|pass| pass.target == RenderTarget::Window));
    let material = app.scene.material().handle().unwrap();
    let shaded: Vec<_> = frame
        .passes
        .iter()
        .flat_map(|pass| pass.draws.iter())
        .filter(|draw| draw.program == material)
        .collect();
    assert_eq!(shaded.len(), app.scene.casters().len());
    assert!(shaded.iter().all(|draw| draw.shadow_map == Some(None)));
}

fn copy_shaders(to: &Path) {
    let from = Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders");
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        fs::copy(entry.path(), to.join(entry.file_name())).unwrap();
    }
}

#[test]
fn broken_material_leaves_the_rest_of_the_frame_running() {
    let dir = tempfile::tempdir().unwrap();
    copy_shaders(dir.path());
    fs::write(
        dir.path().join("material.frag.wgsl"),
        "@fragment fn fs_main() -> @location(0) vec4<f32> { return undefined_value; }",
    )
    .unwrap();

    let (app, backend) = render_frames(
        &SceneConfig::default(),
        &ShaderLibrary::from_dir(dir.path()),
        1,
    );
    let scene = &app.scene;
    assert!(!scene.material().is_linked());
    assert!(!scene.material().diagnostics().is_empty());
    assert!(scene.depth_program().is_linked());
    assert!(scene.lines_program().is_linked());

    let frame = backend.last_frame().unwrap();
    assert_eq!(frame.passes.len(), 2);
    assert_eq!(frame.passes[0].draws.len(), scene.casters().len());
    assert_eq!(frame.skipped_draws, scene.casters().len());
}

#[test]
fn missing_shader_directory_reports_every_program_unusable() {
    let dir = tempfile::tempdir().unwrap();
    let (app, backend) = render_frames(
        &SceneConfig::default(),
        &ShaderLibrary::from_dir(dir.path().join("absent")),
        1,
    );
    let scene = &app.scene;
    for program in [
        scene.material(),
        scene.depth_program(),
        scene.depth_view_program(),
        scene.lines_program(),
    ] {
        assert!(!program.is_linked(), "{} linked", program.label());
    }
    assert_eq!(backend.frames_rendered(), 1);
    assert_eq!(backend.last_frame().unwrap().draw_count(), 0);
}
