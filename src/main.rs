use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use pollster::block_on;
use thiserror::Error;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::{CursorGrabMode, WindowBuilder};

use shadow_scene::{
    summary, CliOptions, Command, DemoConfig, InputState, KeyCode, NamedKey, RenderState,
    Renderer, Scene,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(std::env::args().skip(1))?;
    let mut config = DemoConfig::default();
    options.apply(&mut config);
    let scene = Scene::demo(&config.asset_root);

    if options.summary_only {
        let state = RenderState::new(&config, config.window_width, config.window_height);
        print!("{}", summary(&scene, &state));
        return Ok(());
    }

    run_interactive(config, scene)
}

/// Failures while creating the event loop or the window.
#[derive(Debug, Error)]
enum InitError {
    #[error("failed to initialize event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}

fn run_interactive(config: DemoConfig, scene: Scene) -> Result<()> {
    let event_loop = EventLoop::new().map_err(InitError::from)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(LogicalSize::new(config.window_width, config.window_height))
            .build(&event_loop)
            .map_err(InitError::from)?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window), &config, &scene))
        .context("failed to initialize renderer")?;
    let size = renderer.size();
    let mut app = AppState {
        state: RenderState::new(&config, size.width, size.height),
        renderer,
        scene,
        input: InputState::new(),
        last_error: None,
    };
    app.apply_cursor_lock(app.state.cursor_locked);

    event_loop
        .run(|event, target| {
            target.set_control_flow(ControlFlow::Poll);
            if let Err(err) = app.process_event(event, target) {
                app.last_error = Some(err);
                target.exit();
            }
        })
        .context("event loop terminated abnormally")?;

    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct AppState {
    renderer: Renderer,
    scene: Scene,
    state: RenderState,
    input: InputState,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn process_event(
        &mut self,
        event: Event<()>,
        target: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => target.exit(),
                    WindowEvent::Resized(size) => {
                        info!("resized to {}x{}", size.width, size.height);
                        self.renderer.resize(size);
                        if size.width > 0 && size.height > 0 {
                            self.state.resize(size.width, size.height);
                        }
                    }
                    WindowEvent::Focused(false) => self.input.release_all(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        self.handle_keyboard(&event, target);
                    }
                    WindowEvent::RedrawRequested => self.redraw()?,
                    _ => {}
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } if self.state.cursor_locked => {
                self.input.add_mouse_motion(delta);
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        self.state.look(self.input.take_look_delta());
        self.state.process_input(&self.input);
        match self.renderer.render(&self.scene, &self.state) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("GPU is out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                info!("Surface timeout; retrying next frame");
            }
            Err(other) => warn!("surface error: {other}"),
        }
        Ok(())
    }

    fn handle_keyboard(&mut self, event: &KeyEvent, target: &EventLoopWindowTarget<()>) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => {
                self.input.set_key_down(key);
                if event.repeat {
                    return;
                }
                match self.state.handle_key_press(key) {
                    Some(Command::Exit) => target.exit(),
                    Some(Command::SetCursorLocked(locked)) => self.apply_cursor_lock(locked),
                    None => {}
                }
            }
            ElementState::Released => self.input.set_key_up(key),
        }
    }

    fn apply_cursor_lock(&mut self, locked: bool) {
        let window = self.renderer.window();
        let grabbed = if locked {
            window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(err) = grabbed {
            warn!("cursor grab unavailable: {err}");
        }
        window.set_cursor_visible(!locked);
        // motion from before the toggle must not turn the camera
        self.input.take_look_delta();
    }
}

fn map_keycode(code: WinitKey) -> Option<KeyCode> {
    Some(match code {
        WinitKey::Space => KeyCode::Named(NamedKey::Space),
        WinitKey::Tab => KeyCode::Named(NamedKey::Tab),
        WinitKey::Escape => KeyCode::Named(NamedKey::Escape),
        WinitKey::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        WinitKey::Digit1 => KeyCode::Digit(1),
        WinitKey::Digit2 => KeyCode::Digit(2),
        WinitKey::Digit3 => KeyCode::Digit(3),
        WinitKey::Digit4 => KeyCode::Digit(4),
        WinitKey::KeyA => KeyCode::Character('A'),
        WinitKey::KeyD => KeyCode::Character('D'),
        WinitKey::KeyE => KeyCode::Character('E'),
        WinitKey::KeyF => KeyCode::Character('F'),
        WinitKey::KeyJ => KeyCode::Character('J'),
        WinitKey::KeyL => KeyCode::Character('L'),
        WinitKey::KeyM => KeyCode::Character('M'),
        WinitKey::KeyQ => KeyCode::Character('Q'),
        WinitKey::KeyS => KeyCode::Character('S'),
        WinitKey::KeyW => KeyCode::Character('W'),
        _ => return None,
    })
}
