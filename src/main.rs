//! Drop Dodge entry point
//!
//! Opens the window and runs one simulation tick and one render per frame.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use drop_dodge::Settings;
use drop_dodge::assets::ObjModelProvider;
use drop_dodge::audio::AudioManager;
use drop_dodge::consts::MAX_FRAME_DT;
use drop_dodge::renderer::{Camera, RenderState};
use drop_dodge::sim::{GameState, MoveInput, TickInput, tick};

const TITLE: &str = "Drop Dodge";
const SOUND_DIR: &str = "assets/sounds";

/// Everything that exists once the window is up
struct Game {
    window: Arc<Window>,
    render_state: RenderState,
    state: GameState,
    camera: Camera,
    input: MoveInput,
    audio: AudioManager,
    show_fps: bool,
    last_frame: Instant,
    fps_window_start: Instant,
    fps_frames: u32,
    title: String,
}

impl Game {
    fn new(window: Arc<Window>, settings: &Settings) -> Option<Self> {
        let size = window.inner_size();
        let mut render_state = match pollster::block_on(RenderState::new(
            window.clone(),
            size.width,
            size.height,
            settings,
        )) {
            Ok(render_state) => render_state,
            Err(e) => {
                log::error!("Renderer setup failed: {}", e);
                return None;
            }
        };

        if let Some(path) = &settings.player_model {
            if let Err(e) = render_state.load_player_model(&ObjModelProvider, path) {
                log::error!("Player model unavailable, player will not be drawn: {}", e);
            }
        }

        let state = match settings.seed {
            Some(seed) => GameState::new(seed),
            None => GameState::from_clock(),
        };

        let mut audio = AudioManager::default();
        audio.apply_settings(settings);
        audio.load_effects(Path::new(SOUND_DIR));

        let mut camera = Camera::new(1.0);
        camera.set_viewport(size.width, size.height);

        let now = Instant::now();
        Some(Self {
            window,
            render_state,
            state,
            camera,
            input: MoveInput::default(),
            audio,
            show_fps: settings.show_fps,
            last_frame: now,
            fps_window_start: now,
            fps_frames: 0,
            title: String::new(),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.render_state.resize(size.width, size.height);
        self.camera.set_viewport(size.width, size.height);
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode, pressed: bool, repeat: bool) {
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => self.input.forward = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.input.back = pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.input.left = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.input.right = pressed,
            _ if !pressed || repeat => {}
            KeyCode::Escape => event_loop.exit(),
            KeyCode::KeyR => {
                self.state.reset();
                self.audio.restart();
            }
            KeyCode::F1 => {
                let next = self.render_state.quality().next();
                self.render_state.set_shadow_quality(next);
                log::info!("Quality: {}", next.as_str());
            }
            _ => {}
        }
    }

    /// One simulation step for the time since the last frame
    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(MAX_FRAME_DT);
        self.last_frame = now;

        let input = TickInput {
            movement: self.input,
            facing: self.camera.facing(),
            up: self.camera.up,
        };
        let was_alive = !self.state.is_player_dead();
        tick(&mut self.state, &input, dt);

        if was_alive {
            self.audio.handle_events(&self.state.events);
            if self.state.is_player_dead() {
                log::info!("Survived {:.1}s", self.state.survival_time);
            }
        }

        self.fps_frames += 1;
        let elapsed = (now - self.fps_window_start).as_secs_f32();
        if elapsed >= 1.0 {
            if self.show_fps {
                log::info!("{:.0} fps", self.fps_frames as f32 / elapsed);
            }
            self.fps_frames = 0;
            self.fps_window_start = now;
        }

        self.update_title();
    }

    fn update_title(&mut self) {
        let title = if self.state.is_player_dead() {
            format!(
                "{} - hit after {:.1}s - R to restart",
                TITLE, self.state.survival_time
            )
        } else {
            format!("{} - {:.1}s", TITLE, self.state.survival_time)
        };
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }
}

struct App {
    settings: Settings,
    game: Option<Game>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.game.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(
                self.settings.window_width,
                self.settings.window_height,
            ));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Game::new(window, &self.settings) {
            Some(game) => {
                log::info!("Ready: WASD/arrows move, R restarts, F1 cycles quality, Esc quits");
                game.window.request_redraw();
                self.game = Some(game);
            }
            None => event_loop.exit(),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(game) = &mut self.game else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(new_size) => game.resize(new_size),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat,
                        ..
                    },
                ..
            } => {
                game.handle_key(event_loop, key, key_state == ElementState::Pressed, repeat);
            }
            WindowEvent::Focused(false) => game.input = MoveInput::default(),
            WindowEvent::RedrawRequested => {
                game.update();

                match game.render_state.render(&game.state, &game.camera) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        game.render_state.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory");
                        event_loop.exit();
                    }
                    Err(e) => log::warn!("Render error: {:?}", e),
                }

                game.window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("{} starting...", TITLE);

    let settings = Settings::load();
    log::info!("Quality: {}", settings.quality.as_str());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        settings,
        game: None,
    };
    event_loop.run_app(&mut app)?;
    Ok(())
}
