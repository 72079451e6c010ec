use super::{MeshHandle, ProgramHandle, TargetHandle};

/// Destination of rendering commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The window surface with its own depth buffer.
    Window,
    /// An offscreen depth target.
    Depth(TargetHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Viewport {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BindTarget(RenderTarget),
    SetViewport(Viewport),
    SetColorWrites(bool),
    Clear {
        color: Option<[f64; 4]>,
        depth: Option<f32>,
    },
    /// Makes a program current together with a snapshot of its uniform block.
    UseProgram {
        program: ProgramHandle,
        uniforms: Vec<u8>,
    },
    ReleaseProgram,
    /// Binds a depth target's texture for shadow lookups; `None` binds the
    /// backend's always-lit fallback.
    BindShadowMap(Option<TargetHandle>),
    Draw(MeshHandle),
}

/// A run of commands rendered into one target without an intervening
/// clear. Clears recorded before the first draw become the pass load
/// operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass<'a> {
    pub target: RenderTarget,
    pub clear_color: Option<[f64; 4]>,
    pub clear_depth: Option<f32>,
    /// Every command of the pass in order; state commands must be applied
    /// even when the pass has nothing to draw.
    pub commands: &'a [Command],
}

impl<'a> Pass<'a> {
    fn open(target: RenderTarget) -> Self {
        Self {
            target,
            clear_color: None,
            clear_depth: None,
            commands: &[],
        }
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Draw(_)))
            .count()
    }

    /// Whether the pass touches its attachments at all.
    pub fn is_visible(&self) -> bool {
        self.clear_color.is_some() || self.clear_depth.is_some() || self.draw_count() > 0
    }
}

/// Ordered commands for one frame plus the render state they imply.
///
/// A fresh list starts on the window target with the window viewport and
/// color writes enabled.
#[derive(Debug, Clone)]
pub struct CommandList {
    commands: Vec<Command>,
    window: Viewport,
    target: RenderTarget,
    viewport: Viewport,
    color_writes: bool,
    program: Option<ProgramHandle>,
}

impl CommandList {
    pub fn new(window: impl Into<Viewport>) -> Self {
        let window = window.into();
        Self {
            commands: Vec::new(),
            window,
            target: RenderTarget::Window,
            viewport: window,
            color_writes: true,
            program: None,
        }
    }

    pub fn bind_target(&mut self, target: RenderTarget) {
        self.target = target;
        self.commands.push(Command::BindTarget(target));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.commands.push(Command::SetViewport(viewport));
    }

    pub fn set_color_writes(&mut self, enabled: bool) {
        self.color_writes = enabled;
        self.commands.push(Command::SetColorWrites(enabled));
    }

    pub fn clear(&mut self, color: Option<[f64; 4]>, depth: Option<f32>) {
        self.commands.push(Command::Clear { color, depth });
    }

    pub fn use_program(&mut self, program: ProgramHandle, uniforms: Vec<u8>) {
        self.program = Some(program);
        self.commands.push(Command::UseProgram { program, uniforms });
    }

    pub fn release_program(&mut self) {
        self.program = None;
        self.commands.push(Command::ReleaseProgram);
    }

    pub fn bind_shadow_map(&mut self, target: Option<TargetHandle>) {
        self.commands.push(Command::BindShadowMap(target));
    }

    pub fn draw(&mut self, mesh: MeshHandle) {
        self.commands.push(Command::Draw(mesh));
    }

    pub fn window_viewport(&self) -> Viewport {
        self.window
    }

    pub fn active_target(&self) -> RenderTarget {
        self.target
    }

    pub fn active_viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn color_writes(&self) -> bool {
        self.color_writes
    }

    pub fn active_program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Splits the frame into passes at every target switch and at every
    /// clear that follows a draw.
    pub fn passes(&self) -> Vec<Pass<'_>> {
        let mut passes = Vec::new();
        let mut current = Pass::open(RenderTarget::Window);
        let mut start = 0;
        let mut drawn = false;
        for (index, command) in self.commands.iter().enumerate() {
            match command {
                Command::BindTarget(target) => {
                    current.commands = &self.commands[start..index];
                    passes.push(current);
                    current = Pass::open(*target);
                    start = index + 1;
                    drawn = false;
                }
                Command::Clear { color, depth } => {
                    if drawn {
                        current.commands = &self.commands[start..index];
                        let target = current.target;
                        passes.push(current);
                        current = Pass::open(target);
                        start = index;
                        drawn = false;
                    }
                    if color.is_some() {
                        current.clear_color = *color;
                    }
                    if depth.is_some() {
                        current.clear_depth = *depth;
                    }
                }
                Command::Draw(_) => drawn = true,
                _ => {}
            }
        }
        current.commands = &self.commands[start..];
        passes.push(current);
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_window_target() {
        let list = CommandList::new((800, 600));
        assert_eq!(list.active_target(), RenderTarget::Window);
        assert_eq!(list.active_viewport(), Viewport::new(800, 600));
        assert!(list.color_writes());
        assert!(list.is_empty());
    }

    #[test]
    fn tracks_program_state() {
        let mut list = CommandList::new((1, 1));
        let program = ProgramHandle::from_index(3);
        list.use_program(program, vec![0; 16]);
        assert_eq!(list.active_program(), Some(program));
        list.release_program();
        assert_eq!(list.active_program(), None);
        assert_eq!(list.commands().len(), 2);
    }

    #[test]
    fn passes_split_on_target_switch_and_late_clear() {
        let mut list = CommandList::new((640, 480));
        let target = TargetHandle::from_index(0);
        let mesh = MeshHandle::from_index(0);
        list.bind_target(RenderTarget::Depth(target));
        list.set_viewport(Viewport::new(1024, 1024));
        list.clear(None, Some(1.0));
        list.draw(mesh);
        list.bind_target(RenderTarget::Window);
        list.clear(Some([0.1, 0.1, 0.1, 1.0]), Some(1.0));
        list.draw(mesh);
        list.clear(None, Some(1.0));
        list.draw(mesh);

        let passes = list.passes();
        assert_eq!(passes.len(), 4);
        assert!(!passes[0].is_visible());
        assert_eq!(passes[1].target, RenderTarget::Depth(target));
        assert_eq!(passes[1].clear_depth, Some(1.0));
        assert_eq!(passes[1].clear_color, None);
        assert_eq!(passes[1].draw_count(), 1);
        assert_eq!(passes[2].target, RenderTarget::Window);
        assert_eq!(passes[2].clear_color, Some([0.1, 0.1, 0.1, 1.0]));
        assert_eq!(passes[3].target, RenderTarget::Window);
        assert_eq!(passes[3].clear_color, None);
        assert_eq!(passes[3].draw_count(), 1);
    }
}
