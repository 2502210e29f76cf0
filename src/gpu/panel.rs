//! Parameter panel drawn with egui over the particles.
//!
//! Only built with the `egui` feature. Without it the window has no panel
//! and the keyboard commands are the only controls.

use std::sync::Arc;

use winit::window::Window;

use super::Overlay;
use crate::interaction::Command;
use crate::params::{Parameters, Strategy};

/// Tessellated output of one egui frame, waiting to be painted.
struct PanelOutput {
    paint_jobs: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    pixels_per_point: f32,
    /// Surface size, known once the frame is being recorded.
    size_in_pixels: [u32; 2],
}

pub struct ParameterPanel {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    pending: Option<PanelOutput>,
}

impl ParameterPanel {
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        window: &Arc<Window>,
    ) -> Self {
        let ctx = egui::Context::default();

        let mut style = egui::Style::default();
        style.visuals = egui::Visuals::dark();
        style.visuals.window_shadow = egui::Shadow::NONE;
        style.visuals.popup_shadow = egui::Shadow::NONE;
        ctx.set_style(style);

        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window.as_ref(),
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let renderer = egui_wgpu::Renderer::new(device, output_format, None, 1, false);

        Self {
            ctx,
            state,
            renderer,
            pending: None,
        }
    }

    /// Returns true if egui consumed the event.
    pub fn on_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Lay out the panel, editing `params` in place.
    ///
    /// Returns the commands triggered by the panel's buttons.
    pub fn run(
        &mut self,
        window: &Window,
        params: &mut Parameters,
        strategy: Strategy,
        fps: f32,
    ) -> Vec<Command> {
        let mut commands = Vec::new();
        let raw_input = self.state.take_egui_input(window);

        let full_output = self.ctx.run(raw_input, |ctx| {
            egui::Window::new("Lorenz")
                .default_pos([12.0, 12.0])
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(format!("{} | {:.0} fps", strategy, fps));
                    ui.separator();
                    parameter_controls(ui, params, strategy, &mut commands);
                });
        });

        self.state
            .handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        self.pending = Some(PanelOutput {
            paint_jobs,
            textures_delta: full_output.textures_delta,
            pixels_per_point: full_output.pixels_per_point,
            size_in_pixels: [0, 0],
        });

        commands
    }
}

/// Slider whose range only guides dragging. Loaded values outside it are
/// left as they are.
fn slider<'a, N: egui::emath::Numeric>(
    value: &'a mut N,
    range: std::ops::RangeInclusive<N>,
    text: &str,
) -> egui::Slider<'a> {
    egui::Slider::new(value, range)
        .clamping(egui::SliderClamping::Never)
        .text(text)
}

fn parameter_controls(
    ui: &mut egui::Ui,
    params: &mut Parameters,
    strategy: Strategy,
    commands: &mut Vec<Command>,
) {
    ui.add(slider(&mut params.sigma, 0.0..=50.0, "sigma"));
    ui.add(slider(&mut params.rho, 0.0..=100.0, "rho"));
    ui.add(slider(&mut params.beta, 0.0..=10.0, "beta"));
    ui.add(slider(&mut params.dt, 0.0001..=0.02, "dt").logarithmic(true));
    ui.separator();

    ui.add(slider(&mut params.particle_count, 1_000..=500_000, "particles").logarithmic(true));
    ui.add(slider(&mut params.particle_size, 0.5..=10.0, "size"));
    ui.add(slider(&mut params.particle_brightness, 0.0..=1.0, "brightness"));
    ui.separator();

    ui.add(slider(&mut params.mouse_force, 0.0..=200.0, "mouse force"));
    ui.add_enabled(
        strategy == Strategy::Rk4,
        slider(&mut params.vortex_force, 0.0..=100.0, "vortex"),
    );
    ui.add(slider(&mut params.mouse_radius, 0.0..=1.0, "mouse radius"));
    ui.add(slider(&mut params.damping, 0.9..=1.0, "damping"));
    ui.separator();

    ui.horizontal(|ui| {
        if ui.button("Reset").clicked() {
            commands.push(Command::Reset);
        }
        if ui.button("Export").clicked() {
            commands.push(Command::Export);
        }
    });
}

impl Overlay for ParameterPanel {
    fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        size: [u32; 2],
    ) -> Vec<wgpu::CommandBuffer> {
        let Some(output) = &mut self.pending else {
            return Vec::new();
        };
        output.size_in_pixels = size;

        for (id, image_delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: size,
            pixels_per_point: output.pixels_per_point,
        };
        self.renderer
            .update_buffers(device, queue, encoder, &output.paint_jobs, &screen)
    }

    fn paint(&self, pass: &mut wgpu::RenderPass<'static>) {
        if let Some(output) = &self.pending {
            let screen = egui_wgpu::ScreenDescriptor {
                size_in_pixels: output.size_in_pixels,
                pixels_per_point: output.pixels_per_point,
            };
            self.renderer.render(pass, &output.paint_jobs, &screen);
        }
    }

    fn finish(&mut self) {
        if let Some(output) = self.pending.take() {
            for id in &output.textures_delta.free {
                self.renderer.free_texture(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(params: &mut Parameters, strategy: Strategy) -> Vec<Command> {
        let ctx = egui::Context::default();
        let mut commands = Vec::new();
        // Two passes: egui lays out, then settles.
        for _ in 0..2 {
            let _ = ctx.run(egui::RawInput::default(), |ctx| {
                egui::CentralPanel::default().show(ctx, |ui| {
                    parameter_controls(ui, params, strategy, &mut commands);
                });
            });
        }
        commands
    }

    #[test]
    fn test_out_of_range_values_survive_layout() {
        let loaded = Parameters {
            particle_count: 12,
            damping: 1.05,
            dt: 0.05,
            rho: 250.0,
            ..Parameters::default()
        };
        let mut params = loaded;
        let commands = show(&mut params, Strategy::SingleStep);

        assert_eq!(params, loaded);
        assert!(commands.is_empty());
    }
}
