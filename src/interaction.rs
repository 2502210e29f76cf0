//! Pointer and keyboard input.
//!
//! [`Pointer`] keeps the latest raw cursor position in window pixels and
//! converts it on demand: pixels to normalized device coordinates, then NDC
//! to world units by scaling with the bounding half-extent. The core reads
//! the resulting [`InteractionState`] once per frame.

use glam::Vec2;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels to NDC. Origin at the window center, +y up.
#[inline]
pub fn screen_to_ndc(position: Vec2, width: u32, height: u32) -> Vec2 {
    if width == 0 || height == 0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        position.x / width as f32 * 2.0 - 1.0,
        position.y / height as f32 * -2.0 + 1.0,
    )
}

/// World-space pointer position, the only input the field needs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InteractionState {
    pub mouse: Vec2,
}

impl InteractionState {
    /// Scale NDC against the bounding half-extent.
    #[inline]
    pub fn from_ndc(ndc: Vec2, half_extent: f32) -> Self {
        Self {
            mouse: ndc * half_extent,
        }
    }

    /// A pointer no particle can ever be within range of.
    pub fn far_away() -> Self {
        Self {
            mouse: Vec2::splat(f32::MAX),
        }
    }
}

/// Discrete actions bound to keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Re-seed every particle (`R`).
    Reset,
    /// Export the current parameter record (`E`).
    Export,
    /// Close the window (`Escape`).
    Quit,
}

impl Command {
    fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::KeyR => Some(Command::Reset),
            KeyCode::KeyE => Some(Command::Export),
            KeyCode::Escape => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Cursor tracking for one window.
#[derive(Debug)]
pub struct Pointer {
    position: Vec2,
    window_size: (u32, u32),
    /// Cleared when the cursor leaves the window.
    inside: bool,
    commands: Vec<Command>,
}

impl Pointer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Vec2::new(width as f32 * 0.5, height as f32 * 0.5),
            window_size: (width, height),
            inside: true,
            commands: Vec::new(),
        }
    }

    pub fn ndc(&self) -> Vec2 {
        screen_to_ndc(self.position, self.window_size.0, self.window_size.1)
    }

    /// World-space interaction for a cube of the given half-extent.
    pub fn interaction(&self, half_extent: f32) -> InteractionState {
        if !self.inside {
            return InteractionState::far_away();
        }
        InteractionState::from_ndc(self.ndc(), half_extent)
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Commands triggered since the last call.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Process a winit window event.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.position = Vec2::new(position.x as f32, position.y as f32);
                self.inside = true;
            }
            WindowEvent::CursorLeft { .. } => {
                self.inside = false;
            }
            WindowEvent::Resized(size) => {
                self.set_window_size(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        self.commands.extend(Command::from_key(key));
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_to_ndc_corners() {
        let ndc = |x, y| screen_to_ndc(Vec2::new(x, y), 800, 600);
        assert_eq!(ndc(400.0, 300.0), Vec2::ZERO);
        assert_eq!(ndc(0.0, 0.0), Vec2::new(-1.0, 1.0));
        assert_eq!(ndc(800.0, 600.0), Vec2::new(1.0, -1.0));
        assert_eq!(screen_to_ndc(Vec2::new(5.0, 5.0), 0, 600), Vec2::ZERO);
    }

    #[test]
    fn test_world_scales_with_bounds() {
        let mut pointer = Pointer::new(1000, 500);
        pointer.set_position(Vec2::new(750.0, 125.0));
        assert_eq!(pointer.ndc(), Vec2::new(0.5, 0.5));
        assert_eq!(pointer.interaction(50.0).mouse, Vec2::new(25.0, 25.0));

        pointer.set_window_size(2000, 500);
        assert_eq!(pointer.interaction(50.0).mouse, Vec2::new(-12.5, 25.0));
    }

    #[test]
    fn test_pointer_starts_at_center() {
        let pointer = Pointer::new(640, 480);
        assert_eq!(pointer.interaction(50.0), InteractionState::default());
    }

    #[test]
    fn test_far_away_pointer_has_no_effect() {
        use crate::field::pointer_perturbation;
        use crate::params::Parameters;
        use glam::Vec3;

        let far = InteractionState::far_away();
        let position = Vec3::new(10.0, -10.0, 5.0);
        let force = pointer_perturbation(position, &Parameters::default(), far.mouse, 15.0);
        assert_eq!(force, Vec3::ZERO);
    }

    fn device() -> winit::event::DeviceId {
        // SAFETY: only used as an opaque tag, never handed to the platform.
        unsafe { winit::event::DeviceId::dummy() }
    }

    fn moved(x: f64, y: f64) -> WindowEvent {
        WindowEvent::CursorMoved {
            device_id: device(),
            position: winit::dpi::PhysicalPosition::new(x, y),
        }
    }

    #[test]
    fn test_cursor_events_drive_interaction() {
        let mut pointer = Pointer::new(800, 600);

        pointer.handle_event(&moved(400.0, 300.0));
        assert_eq!(pointer.ndc(), Vec2::ZERO);
        assert_eq!(pointer.interaction(50.0).mouse, Vec2::ZERO);

        pointer.handle_event(&WindowEvent::CursorLeft {
            device_id: device(),
        });
        assert_eq!(pointer.interaction(50.0), InteractionState::far_away());

        // Coming back restores the tracked position.
        pointer.handle_event(&moved(800.0, 0.0));
        assert_eq!(pointer.interaction(50.0).mouse, Vec2::new(50.0, 50.0));
    }

    #[test]
    fn test_resize_event_rescales_pointer() {
        let mut pointer = Pointer::new(800, 600);
        pointer.handle_event(&moved(400.0, 300.0));
        pointer.handle_event(&WindowEvent::Resized(winit::dpi::PhysicalSize::new(1600, 600)));
        assert_eq!(pointer.ndc(), Vec2::new(-0.5, 0.0));
        assert!(pointer.take_commands().is_empty());
    }
}
