//! Demo configuration: built-in defaults, an optional XML scene file and
//! the command line.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use roxmltree::{Document, Node};

use crate::camera::Camera;
use crate::light::{Light, LightOrbit};
use crate::math::Vec3;
use crate::render::depth_target::DEFAULT_SIZE;

/// Default frame-rate cap of the pacer.
pub const DEFAULT_FRAME_CAP: f64 = 100.0;
/// Frames rendered by `--summary-only` when `--frames` is not given.
pub const DEFAULT_SUMMARY_FRAMES: u32 = 3;

/// Everything the shadow scene needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub light: Light,
    /// Scripted light motion; `None` keeps the light still.
    pub light_orbit: Option<LightOrbit>,
    pub camera: Camera,
    pub shadow_map_size: (u32, u32),
    pub frame_cap: f64,
    pub show_depth_view: bool,
    pub show_helpers: bool,
    pub clear_color: [f64; 4],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            light: Light::default(),
            light_orbit: Some(LightOrbit::default()),
            camera: Camera::default(),
            shadow_map_size: (DEFAULT_SIZE, DEFAULT_SIZE),
            frame_cap: DEFAULT_FRAME_CAP,
            show_depth_view: true,
            show_helpers: true,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

impl SceneConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file {}", path.display()))?;
        Self::from_xml(&xml).with_context(|| format!("invalid scene file {}", path.display()))
    }

    /// Parses a scene file. Anything left out keeps its default.
    ///
    /// ```xml
    /// <scene>
    ///   <light>
    ///     <position>-0.5 -0.5 1</position>
    ///     <look-at>0 0 0</look-at>
    ///     <extent>1 1 2</extent>
    ///     <orbit enabled="true"><radius>1</radius><height>1</height><speed>1</speed></orbit>
    ///   </light>
    ///   <camera><position>0 -1 0.75</position><fov>60</fov></camera>
    ///   <shadow-map><width>1024</width><height>1024</height></shadow-map>
    ///   <frame-cap>100</frame-cap>
    ///   <debug-view>true</debug-view>
    /// </scene>
    /// ```
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        if !root.has_tag_name("scene") {
            return Err(anyhow!(
                "expected <scene> root element, found <{}>",
                root.tag_name().name()
            ));
        }

        let mut config = Self::default();

        if let Some(node) = child(&root, "light") {
            let light = &mut config.light;
            light.position = parse_vec3(optional_text(&node, "position"), light.position)?;
            light.look_at = parse_vec3(optional_text(&node, "look-at"), light.look_at)?;
            light.up = parse_vec3(optional_text(&node, "up"), light.up)?;
            light.shadow_extent =
                parse_vec3(optional_text(&node, "extent"), light.shadow_extent)?;

            if let Some(orbit_node) = child(&node, "orbit") {
                if parse_bool(orbit_node.attribute("enabled").map(str::to_string), true)? {
                    let mut orbit = config.light_orbit.unwrap_or_default();
                    orbit.radius = parse_f64(optional_text(&orbit_node, "radius"), orbit.radius)?;
                    orbit.height = parse_f64(optional_text(&orbit_node, "height"), orbit.height)?;
                    orbit.angular_speed =
                        parse_f64(optional_text(&orbit_node, "speed"), orbit.angular_speed)?;
                    config.light_orbit = Some(orbit);
                } else {
                    config.light_orbit = None;
                }
            }
        }

        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.position = parse_vec3(optional_text(&node, "position"), camera.position)?;
            camera.look_at = parse_vec3(optional_text(&node, "look-at"), camera.look_at)?;
            camera.up = parse_vec3(optional_text(&node, "up"), camera.up)?;
            camera.fov_y = parse_f64(optional_text(&node, "fov"), camera.fov_y)?;
            camera.near = parse_f64(optional_text(&node, "near"), camera.near)?;
            camera.far = parse_f64(optional_text(&node, "far"), camera.far)?;
        }

        if let Some(node) = child(&root, "shadow-map") {
            let (width, height) = config.shadow_map_size;
            config.shadow_map_size = (
                parse_u32(optional_text(&node, "width"), width)?,
                parse_u32(optional_text(&node, "height"), height)?,
            );
        }

        config.frame_cap = parse_f64(optional_text(&root, "frame-cap"), config.frame_cap)?;
        config.show_depth_view =
            parse_bool(optional_text(&root, "debug-view"), config.show_depth_view)?;
        config.show_helpers = parse_bool(optional_text(&root, "helpers"), config.show_helpers)?;
        if let Some(color) = optional_text(&root, "clear-color") {
            let rgb = parse_vec3(Some(color), Vec3::ZERO)?;
            config.clear_color = [rgb.x, rgb.y, rgb.z, 1.0];
        }

        Ok(config)
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f64>()
                .map_err(|err| anyhow!("failed to parse `{component}`: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("expected three components, got `{value}`")),
    }
}

fn parse_f64(value: Option<String>, default: f64) -> Result<f64> {
    match value {
        Some(value) => value
            .parse::<f64>()
            .map_err(|err| anyhow!("failed to parse float `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_u32(value: Option<String>, default: u32) -> Result<u32> {
    match value {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse integer `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("expected a boolean, got `{other}`")),
    }
}

const USAGE: &str =
    "Usage: shadow-mapping [--scene <file.xml>] [--shaders <dir>] [--summary-only] [--frames <n>]";

/// Command line of the demo binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub scene: Option<PathBuf>,
    pub shaders: Option<PathBuf>,
    pub summary_only: bool,
    pub frames: u32,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            scene: None,
            shaders: None,
            summary_only: false,
            frames: DEFAULT_SUMMARY_FRAMES,
        }
    }
}

impl CliOptions {
    pub fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from<I>(args: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--scene" => {
                    let path = args.next().ok_or_else(|| anyhow!("--scene needs a file\n{USAGE}"))?;
                    options.scene = Some(PathBuf::from(path));
                }
                "--shaders" => {
                    let dir = args
                        .next()
                        .ok_or_else(|| anyhow!("--shaders needs a directory\n{USAGE}"))?;
                    options.shaders = Some(PathBuf::from(dir));
                }
                "--summary-only" => options.summary_only = true,
                "--frames" => {
                    let count = args.next().ok_or_else(|| anyhow!("--frames needs a count\n{USAGE}"))?;
                    options.frames = count
                        .parse()
                        .with_context(|| format!("invalid frame count `{count}`"))?;
                }
                "-h" | "--help" => return Err(anyhow!(USAGE)),
                other => {
                    return Err(anyhow!("Unknown argument: {other}\n{USAGE}"));
                }
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <light>
            <position>1 2 3</position>
            <extent>2 2 4</extent>
            <orbit enabled="false"/>
        </light>
        <camera>
            <position>0 -2 1</position>
            <fov>45</fov>
        </camera>
        <shadow-map>
            <width>2048</width>
        </shadow-map>
        <frame-cap>30</frame-cap>
        <debug-view>false</debug-view>
    </scene>
    "#;

    #[test]
    fn parse_scene_overrides_defaults() {
        let config = SceneConfig::from_xml(SAMPLE).unwrap();
        assert_eq!(config.light.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(config.light.look_at, Vec3::ZERO);
        assert_eq!(config.light.shadow_extent, Vec3::new(2.0, 2.0, 4.0));
        assert_eq!(config.light_orbit, None);
        assert_eq!(config.camera.position, Vec3::new(0.0, -2.0, 1.0));
        assert_eq!(config.camera.fov_y, 45.0);
        assert_eq!(config.shadow_map_size, (2048, DEFAULT_SIZE));
        assert_eq!(config.frame_cap, 30.0);
        assert!(!config.show_depth_view);
        assert!(config.show_helpers);
    }

    #[test]
    fn empty_scene_is_the_default_scene() {
        let config = SceneConfig::from_xml("<scene/>").unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(SceneConfig::from_xml("<scene><frame-cap>fast</frame-cap></scene>").is_err());
        assert!(SceneConfig::from_xml(
            "<scene><light><position>1 2</position></light></scene>"
        )
        .is_err());
        assert!(SceneConfig::from_xml("<world/>").is_err());
    }

    #[test]
    fn load_reads_scene_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.xml");
        fs::write(&path, SAMPLE).unwrap();
        let config = SceneConfig::load(&path).unwrap();
        assert_eq!(config.frame_cap, 30.0);
        assert!(SceneConfig::load(&dir.path().join("missing.xml")).is_err());
    }

    #[test]
    fn cli_options() {
        let options = CliOptions::parse_from([
            "--scene",
            "demo.xml",
            "--summary-only",
            "--frames",
            "5",
        ])
        .unwrap();
        assert_eq!(options.scene, Some(PathBuf::from("demo.xml")));
        assert!(options.summary_only);
        assert_eq!(options.frames, 5);
        assert_eq!(options.shaders, None);

        assert_eq!(
            CliOptions::parse_from(Vec::<String>::new()).unwrap(),
            CliOptions::default()
        );
        assert!(CliOptions::parse_from(["--frames"]).is_err());
        assert!(CliOptions::parse_from(["--bogus"]).is_err());
    }
}
