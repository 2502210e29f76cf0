//! The winit application: one simulation step and one render per redraw.

use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

#[cfg(feature = "egui")]
use crate::gpu::{Overlay, ParameterPanel};
use crate::error::SimulationError;
use crate::gpu::GpuState;
use crate::interaction::{Command, Pointer};
use crate::params::{Config, Parameters};
use crate::particles::ParticleSet;
use crate::simulation::{cpu_simulation, make_rng, FrameInput, ParticleSimulation};
use crate::time::FrameClock;

/// Where exported configurations are written.
pub const EXPORT_PATH: &str = "lorenz-config.json";

const TITLE: &str = "Lorenz Flow";

pub struct App {
    config: Config,
    /// Live parameters; the panel edits these, each frame snapshots them.
    params: Parameters,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    /// `None` for the GPU strategy.
    cpu: Option<Box<dyn ParticleSimulation>>,
    /// Seeds GPU-side particle sets.
    rng: ChaCha8Rng,
    pointer: Pointer,
    clock: FrameClock,
    /// Particle count the buffers were last allocated for.
    live_count: u32,
    #[cfg(feature = "egui")]
    panel: Option<ParameterPanel>,
    error: Option<SimulationError>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let params = config.parameters;
        let cpu = cpu_simulation(config.strategy, params.count(), &config.bounds, config.seed);
        Self {
            params,
            window: None,
            gpu_state: None,
            cpu,
            rng: make_rng(config.seed),
            pointer: Pointer::new(1280, 720),
            clock: FrameClock::new(),
            live_count: params.particle_count,
            #[cfg(feature = "egui")]
            panel: None,
            error: None,
            config,
        }
    }

    /// Consume the app after the event loop exits, surfacing any startup error.
    pub fn finish(self) -> Result<(), SimulationError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SimulationError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), SimulationError> {
        let window_attrs = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();
        self.pointer.set_window_size(size.width, size.height);

        let seeded;
        let initial = match &self.cpu {
            Some(cpu) => cpu.particles(),
            None => {
                seeded = self.seed_particles();
                &seeded
            }
        };
        let gpu_state =
            pollster::block_on(GpuState::new(window.clone(), self.config.strategy, initial))?;

        #[cfg(feature = "egui")]
        {
            self.panel = Some(ParameterPanel::new(
                gpu_state.device(),
                gpu_state.surface_format(),
                &window,
            ));
        }

        self.window = Some(window);
        self.gpu_state = Some(gpu_state);
        Ok(())
    }

    fn seed_particles(&mut self) -> ParticleSet {
        let volume = self.config.bounds.seed_volume();
        ParticleSet::seeded(self.params.count(), &volume, &mut self.rng)
    }

    /// Re-seed every particle at the current count.
    fn reset(&mut self) {
        let count = self.params.count();
        match &mut self.cpu {
            Some(cpu) => cpu.reset(count, &self.config.bounds.seed_volume()),
            None => {
                let set = self.seed_particles();
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.reset(&set);
                }
            }
        }
        self.live_count = self.params.particle_count;
        log::info!("reset {} particles", count);
    }

    fn export(&self) {
        let json = match self.params.to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("export failed: {}", e);
                return;
            }
        };
        println!("{}", json);

        let config = Config {
            parameters: self.params,
            ..self.config.clone()
        };
        match config.save(EXPORT_PATH) {
            Ok(()) => log::info!("exported configuration to {}", EXPORT_PATH),
            Err(e) => log::error!("export failed: {}", e),
        }
    }

    fn run_commands(&mut self, event_loop: &ActiveEventLoop, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Reset => self.reset(),
                Command::Export => self.export(),
                Command::Quit => event_loop.exit(),
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let commands = self.pointer.take_commands();
        self.run_commands(event_loop, commands);

        #[cfg(feature = "egui")]
        {
            let commands = match (&mut self.panel, &self.window) {
                (Some(panel), Some(window)) => {
                    panel.run(window, &mut self.params, self.config.strategy, self.clock.fps())
                }
                _ => Vec::new(),
            };
            self.run_commands(event_loop, commands);
        }

        // A count change reallocates before anything reads the buffers.
        if self.params.particle_count != self.live_count {
            self.reset();
        }

        let frame = FrameInput {
            params: self.params,
            mouse: self.pointer.interaction(self.config.bounds.half_extent).mouse,
            bounds: self.config.bounds,
            frame: self.clock.frame(),
        };

        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };

        let kernel_frame = match &mut self.cpu {
            Some(cpu) => {
                let reseeded = cpu.step(&frame);
                if reseeded > 0 {
                    log::debug!("re-seeded {} escaped particles", reseeded);
                }
                gpu_state.upload(cpu.particles());
                None
            }
            None => Some(&frame),
        };

        #[cfg(feature = "egui")]
        let overlay = self.panel.as_mut().map(|panel| panel as &mut dyn Overlay);
        #[cfg(not(feature = "egui"))]
        let overlay = None;

        match gpu_state.render(kernel_frame, &self.params, overlay) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = winit::dpi::PhysicalSize::new(
                    gpu_state.config.width,
                    gpu_state.config.height,
                );
                gpu_state.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("surface out of memory");
                event_loop.exit();
            }
            Err(e) => log::warn!("render error: {:?}", e),
        }

        if let Some(fps) = self.clock.tick() {
            let count = gpu_state.count();
            let strategy = self.config.strategy;
            log::info!("{:.1} fps, {} particles ({})", fps, count, strategy);
            if let Some(window) = &self.window {
                window.set_title(&format!(
                    "{} | {} | {} particles | {:.0} fps",
                    TITLE, strategy, count, fps
                ));
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(error) = self.init(event_loop) {
                self.fail(event_loop, error);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        #[cfg(feature = "egui")]
        let consumed = match (&mut self.panel, &self.window) {
            (Some(panel), Some(window)) => panel.on_window_event(window, &event),
            _ => false,
        };
        #[cfg(not(feature = "egui"))]
        let consumed = false;

        // Clicks and drags on the panel do not steer the particles.
        if !consumed {
            self.pointer.handle_event(&event);
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
