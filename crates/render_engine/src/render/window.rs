//! Window management using GLFW
//!
//! Provides the window, the resize flag polled by the frame loop, and the
//! translation from GLFW events into [`InputState`].

use super::input::{DragKind, InputState};
use super::lighting::LightingFeatures;
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// What the swapchain code needs from a window
pub trait SurfaceWindow {
    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Block until at least one window event arrives
    fn wait_events(&mut self);
}

/// Block while the framebuffer has a zero dimension (minimized window)
///
/// Returns the first non-zero size observed.
pub fn wait_while_minimized<W: SurfaceWindow + ?Sized>(window: &mut W) -> (u32, u32) {
    let mut size = window.framebuffer_size();
    if size.0 == 0 || size.1 == 0 {
        log::info!("Window minimized, waiting for a non-zero framebuffer");
    }
    while size.0 == 0 || size.1 == 0 {
        window.wait_events();
        size = window.framebuffer_size();
    }
    size
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
    framebuffer_size: (u32, u32),
    input: InputState,
}

impl Window {
    /// Create a resizable window without a client API
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_mouse_button_polling(true);
        window.set_framebuffer_size_polling(true);

        let (fb_width, fb_height) = window.get_framebuffer_size();
        log::info!("Created window '{}' ({}x{})", title, fb_width, fb_height);

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
            framebuffer_size: (fb_width.max(0) as u32, fb_height.max(0) as u32),
            input: InputState::default(),
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll GLFW and fold the queued events into the window state
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.process_events();
    }

    /// Take the resize flag, clearing it
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.framebuffer_resized)
    }

    /// Drag and toggle state
    pub fn input(&self) -> &InputState {
        &self.input
    }

    fn process_events(&mut self) {
        let events: Vec<glfw::WindowEvent> = glfw::flush_messages(&self.events).map(|(_, event)| event).collect();

        for event in events {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    self.framebuffer_resized = true;
                    self.framebuffer_size = (width.max(0) as u32, height.max(0) as u32);
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                }
                glfw::WindowEvent::MouseButton(button, action, _) => {
                    let kind = match button {
                        glfw::MouseButton::Button1 => DragKind::Translate,
                        glfw::MouseButton::Button2 => DragKind::Rotate,
                        _ => continue,
                    };
                    let (x, y) = self.window.get_cursor_pos();
                    let cursor = InputState::normalize_cursor(x, y, self.framebuffer_size);
                    match action {
                        glfw::Action::Press => self.input.press(kind, cursor),
                        glfw::Action::Release => self.input.release(kind, cursor),
                        glfw::Action::Repeat => {}
                    }
                }
                glfw::WindowEvent::Key(key, _, glfw::Action::Press, _) => match key {
                    glfw::Key::A => self.input.toggle(LightingFeatures::AMBIENT),
                    glfw::Key::D => self.input.toggle(LightingFeatures::DIFFUSE),
                    glfw::Key::S => self.input.toggle(LightingFeatures::SPECULAR),
                    glfw::Key::T => self.input.toggle(LightingFeatures::TEXTURE),
                    glfw::Key::Escape => self.window.set_should_close(true),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {:?}", result)))
        }
    }
}

impl SurfaceWindow for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.process_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedWindow {
        sizes: Vec<(u32, u32)>,
        waits: usize,
    }

    impl SurfaceWindow for ScriptedWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.sizes[self.waits.min(self.sizes.len() - 1)]
        }

        fn wait_events(&mut self) {
            self.waits += 1;
        }
    }

    #[test]
    fn test_visible_window_does_not_wait() {
        let mut window = ScriptedWindow { sizes: vec![(800, 600)], waits: 0 };
        assert_eq!(wait_while_minimized(&mut window), (800, 600));
        assert_eq!(window.waits, 0);
    }

    #[test]
    fn test_minimized_window_blocks_until_restored() {
        let mut window = ScriptedWindow {
            sizes: vec![(0, 0), (640, 0), (640, 480)],
            waits: 0,
        };
        assert_eq!(wait_while_minimized(&mut window), (640, 480));
        assert_eq!(window.waits, 2);
    }
}
