//! Offscreen depth-only render target used as the shadow map.

use log::{error, info};

use super::{CommandList, RenderBackend, RenderError, RenderTarget, TargetHandle, Viewport};

/// Default shadow map resolution.
pub const DEFAULT_SIZE: u32 = 1024;

/// Checks that a depth target of `width` x `height` can be complete on a
/// device whose textures are limited to `max_dimension` texels per side.
pub fn validate_size(width: u32, height: u32, max_dimension: u32) -> Result<(), RenderError> {
    let reason = if width == 0 || height == 0 {
        "zero sized attachment".to_string()
    } else if width > max_dimension || height > max_dimension {
        format!("attachment exceeds the device limit of {max_dimension} texels")
    } else {
        return Ok(());
    };
    Err(RenderError::FramebufferIncomplete {
        width,
        height,
        reason,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetStatus {
    Uninitialized,
    Complete,
    Incomplete(String),
}

/// Depth texture plus the framebuffer state needed to render into it.
///
/// The size is fixed at creation and independent of the window.
#[derive(Debug, Clone)]
pub struct DepthTarget {
    handle: Option<TargetHandle>,
    size: Viewport,
    status: TargetStatus,
}

impl Default for DepthTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthTarget {
    pub fn new() -> Self {
        Self {
            handle: None,
            size: Viewport::new(0, 0),
            status: TargetStatus::Uninitialized,
        }
    }

    /// Allocates the target. Failure is reported here, once, and leaves
    /// the target incomplete so binding it becomes a no-op.
    pub fn init<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, width: u32, height: u32) -> bool {
        self.size = Viewport::new(width, height);
        match backend.create_depth_target("shadow-map", width, height) {
            Ok(handle) => {
                info!("created {width}x{height} shadow map");
                self.handle = Some(handle);
                self.status = TargetStatus::Complete;
                true
            }
            Err(err) => {
                error!("shadow map unavailable, rendering without shadows: {err}");
                self.handle = None;
                self.status = TargetStatus::Incomplete(err.to_string());
                false
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == TargetStatus::Complete
    }

    pub fn status(&self) -> &TargetStatus {
        &self.status
    }

    pub fn size(&self) -> Viewport {
        self.size
    }

    /// Texture to sample in the color pass, if the target is usable.
    pub fn texture(&self) -> Option<TargetHandle> {
        self.handle
    }

    /// Redirects rendering into the target, disables color output and
    /// restricts the viewport to the target resolution. Returns `false`
    /// without recording anything when the target is incomplete.
    pub fn bind(&self, commands: &mut CommandList) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        commands.bind_target(RenderTarget::Depth(handle));
        commands.set_color_writes(false);
        commands.set_viewport(self.size);
        true
    }

    /// Restores the window target, its viewport and color output.
    pub fn unbind(&self, commands: &mut CommandList) {
        if self.handle.is_none() {
            return;
        }
        commands.bind_target(RenderTarget::Window);
        commands.set_color_writes(true);
        commands.set_viewport(commands.window_viewport());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;

    #[test]
    fn bind_switches_viewport_and_unbind_restores_window() {
        let mut backend = HeadlessBackend::new(1280, 720);
        let mut target = DepthTarget::new();
        assert!(target.init(&mut backend, 1024, 1024));

        let mut commands = CommandList::new(backend.window_size());
        assert!(target.bind(&mut commands));
        assert_eq!(commands.active_viewport(), Viewport::new(1024, 1024));
        assert!(!commands.color_writes());
        assert!(matches!(commands.active_target(), RenderTarget::Depth(_)));

        target.unbind(&mut commands);
        assert_eq!(commands.active_viewport(), Viewport::new(1280, 720));
        assert!(commands.color_writes());
        assert_eq!(commands.active_target(), RenderTarget::Window);
    }

    #[test]
    fn incomplete_target_binds_nothing() {
        let mut backend = HeadlessBackend::new(640, 480);
        let mut target = DepthTarget::new();
        assert!(!target.init(&mut backend, 0, 1024));
        assert!(matches!(target.status(), TargetStatus::Incomplete(_)));

        let mut commands = CommandList::new(backend.window_size());
        assert!(!target.bind(&mut commands));
        target.unbind(&mut commands);
        assert!(commands.is_empty());
    }

    #[test]
    fn size_validation() {
        assert!(validate_size(1024, 1024, 8192).is_ok());
        assert!(validate_size(0, 1024, 8192).is_err());
        assert!(validate_size(16384, 16, 8192).is_err());
    }
}
