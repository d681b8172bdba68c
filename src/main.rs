use std::env;
use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail, ensure, Context, Result};
use glam::Vec3;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::video::GLProfile;
use sdl2::VideoSubsystem;

mod camera;
mod input;
mod renderer;

use camera::{Camera, CameraController, FirstPersonController, TrackballController};
use input::InputState;
use renderer::{FrameSettings, Renderer};

const USAGE: &str = "Usage: gltf-view <scene.gltf> \
    [--lookat ex,ey,ez,cx,cy,cz,ux,uy,uz] [--output image.png] \
    [--width N] [--height N]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let document = renderer::loader::load(&options.scene_path)?;

    let world_up = Vec3::Y;
    let scene_index = document.default_scene;
    if scene_index.is_none() {
        log::warn!("document declares no default scene; nothing will be drawn");
    }
    let bounds = scene_index.and_then(|scene| document.scene_bounds(scene));
    let max_distance = bounds
        .map(|(min, max)| (max - min).length())
        .filter(|distance| *distance > 0.0)
        .unwrap_or(100.0);
    let camera = match options.lookat {
        Some(lookat) => Camera::new(
            Vec3::from_slice(&lookat[0..3]),
            Vec3::from_slice(&lookat[3..6]),
            Vec3::from_slice(&lookat[6..9]),
        ),
        None => frame_scene(bounds, world_up),
    };

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    // Linear->SRGB conversion is done in shader.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let mut window_builder =
        video_subsystem.window(env!("CARGO_PKG_NAME"), options.width, options.height);
    window_builder.opengl().resizable();
    if options.output.is_some() {
        window_builder.hidden();
    }
    let window = window_builder.build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let mut renderer = Renderer::new(&video_subsystem, &window, document)?;
    renderer.set_scene_depth(max_distance);
    let mut state = ViewerState::new();

    if let Some(output) = &options.output {
        let pixels = renderer.render_to_image(
            options.width,
            options.height,
            &camera,
            &state.frame_settings(),
        )?;
        image::save_buffer(
            output,
            &pixels,
            options.width,
            options.height,
            image::ColorType::Rgb8,
        )
        .with_context(|| format!("failed to write {}", output.display()))?;
        log::info!(
            "wrote {}x{} frame to {}",
            options.width,
            options.height,
            output.display(),
        );
        return Ok(());
    }

    let mut controller: Box<dyn CameraController> = Box::new(FirstPersonController::new(
        camera,
        world_up,
        0.5 * max_distance,
    ));
    let mut last_tick = Instant::now();
    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                Event::Window {
                    win_event: WindowEvent::Resized(w, h),
                    ..
                } => renderer.resize(w, h),
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => match keycode {
                    Keycode::Escape => break 'running,
                    Keycode::Tab => {
                        // Swapping controllers keeps the current pose.
                        let pose = controller.camera();
                        controller = match state.camera_mode {
                            CameraMode::FirstPerson => {
                                state.camera_mode = CameraMode::Trackball;
                                Box::new(TrackballController::new(pose, world_up))
                            }
                            CameraMode::Trackball => {
                                state.camera_mode = CameraMode::FirstPerson;
                                Box::new(FirstPersonController::new(
                                    pose,
                                    world_up,
                                    0.5 * max_distance,
                                ))
                            }
                        };
                        log::info!("switched to {:?} camera", state.camera_mode);
                    }
                    Keycode::O => state.apply_occlusion = !state.apply_occlusion,
                    Keycode::N => state.apply_normal_mapping = !state.apply_normal_mapping,
                    Keycode::C => copy_camera_args(&video_subsystem, &controller.camera()),
                    Keycode::Comma => state.light_theta -= 0.1,
                    Keycode::Period => state.light_theta += 0.1,
                    Keycode::LeftBracket => state.light_phi -= 0.1,
                    Keycode::RightBracket => state.light_phi += 0.1,
                    _ => {}
                },
                _ => {}
            }
        }

        let elapsed = last_tick.elapsed().as_secs_f32();
        last_tick = Instant::now();
        let input = InputState::capture(&event_pump);
        controller.update(&input, elapsed);

        renderer.draw_frame(&controller.camera(), &state.frame_settings());
        window.gl_swap_window();
    }

    Ok(())
}

#[derive(Clone, Copy, Debug)]
enum CameraMode {
    FirstPerson,
    Trackball,
}

/// Light and feature-toggle state that persists across frames. Owned by the
/// render loop and threaded into each draw, never global.
struct ViewerState {
    camera_mode: CameraMode,
    light_theta: f32,
    light_phi: f32,
    light_intensity: f32,
    apply_occlusion: bool,
    apply_normal_mapping: bool,
}

impl ViewerState {
    fn new() -> ViewerState {
        ViewerState {
            camera_mode: CameraMode::FirstPerson,
            light_theta: 0.8,
            light_phi: 0.6,
            light_intensity: 1.0,
            apply_occlusion: true,
            apply_normal_mapping: true,
        }
    }

    fn frame_settings(&self) -> FrameSettings {
        let (sin_theta, cos_theta) = self.light_theta.sin_cos();
        let (sin_phi, cos_phi) = self.light_phi.sin_cos();
        FrameSettings {
            light_direction: Vec3::new(sin_theta * cos_phi, cos_theta, sin_theta * sin_phi),
            light_intensity: Vec3::splat(self.light_intensity),
            apply_occlusion: self.apply_occlusion,
            apply_normal_mapping: self.apply_normal_mapping,
        }
    }
}

/// Default camera from the scene bounds: look at the center from one
/// diagonal away, or from the side when the scene is flat in Z.
fn frame_scene(bounds: Option<(Vec3, Vec3)>, world_up: Vec3) -> Camera {
    let Some((min, max)) = bounds else {
        return Camera::new(Vec3::ZERO, Vec3::NEG_Z, world_up);
    };
    let center = 0.5 * (min + max);
    let diagonal = max - min;
    let eye = if diagonal.z > 0.0 {
        center + diagonal
    } else {
        center + 2.0 * diagonal.cross(world_up)
    };
    Camera::new(eye, center, world_up)
}

fn copy_camera_args(video: &VideoSubsystem, camera: &Camera) {
    let args = format!(
        "--lookat {},{},{},{},{},{},{},{},{}",
        camera.eye.x,
        camera.eye.y,
        camera.eye.z,
        camera.center.x,
        camera.center.y,
        camera.center.z,
        camera.up.x,
        camera.up.y,
        camera.up.z,
    );
    log::info!("camera: {args}");
    if let Err(err) = video.clipboard().set_clipboard_text(&args) {
        log::warn!("failed to copy camera args to clipboard: {err}");
    }
}

struct CliOptions {
    scene_path: PathBuf,
    lookat: Option<[f32; 9]>,
    output: Option<PathBuf>,
    width: u32,
    height: u32,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<CliOptions> {
        let mut scene_path = None;
        let mut lookat = None;
        let mut output = None;
        let mut width = 1280;
        let mut height = 720;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--lookat" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--lookat needs a value\n{USAGE}"))?;
                    lookat = Some(parse_lookat(&value)?);
                }
                "--output" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--output needs a path\n{USAGE}"))?;
                    output = Some(PathBuf::from(value));
                }
                "--width" => width = parse_dimension(args.next(), "--width")?,
                "--height" => height = parse_dimension(args.next(), "--height")?,
                other if other.starts_with("--") => {
                    bail!("unknown argument {other}\n{USAGE}");
                }
                other => {
                    ensure!(
                        scene_path.is_none(),
                        "unexpected extra argument {other}\n{USAGE}",
                    );
                    scene_path = Some(PathBuf::from(other));
                }
            }
        }
        Ok(CliOptions {
            scene_path: scene_path.ok_or_else(|| anyhow!("{USAGE}"))?,
            lookat,
            output,
            width,
            height,
        })
    }
}

fn parse_lookat(value: &str) -> Result<[f32; 9]> {
    let values = value
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .context("--lookat expects nine comma-separated numbers")?;
    values
        .try_into()
        .map_err(|_| anyhow!("--lookat expects exactly nine numbers\n{USAGE}"))
}

fn parse_dimension(value: Option<String>, flag: &str) -> Result<u32> {
    let value = value.ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))?;
    let parsed: u32 = value
        .parse()
        .with_context(|| format!("{flag} expects a positive integer"))?;
    ensure!(parsed > 0, "{flag} must be non-zero");
    Ok(parsed)
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn scene_path_is_required() {
        assert!(parse(&[]).is_err());
        let options = parse(&["scene.gltf"]).unwrap();
        assert_eq!(options.scene_path, PathBuf::from("scene.gltf"));
        assert_eq!((options.width, options.height), (1280, 720));
        assert!(options.lookat.is_none());
        assert!(options.output.is_none());
    }

    #[test]
    fn lookat_parses_nine_numbers() {
        let options = parse(&["scene.gltf", "--lookat", "1,2,3,0,0,0,0,1,0"]).unwrap();
        let lookat = options.lookat.unwrap();
        assert_eq!(&lookat[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&lookat[6..9], &[0.0, 1.0, 0.0]);
        assert!(parse(&["scene.gltf", "--lookat", "1,2,3"]).is_err());
        assert!(parse(&["scene.gltf", "--lookat", "a,b,c,d,e,f,g,h,i"]).is_err());
    }

    #[test]
    fn export_options_round_trip() {
        let options = parse(&[
            "scene.gltf",
            "--output",
            "frame.png",
            "--width",
            "640",
            "--height",
            "480",
        ])
        .unwrap();
        assert_eq!(options.output, Some(PathBuf::from("frame.png")));
        assert_eq!((options.width, options.height), (640, 480));
        assert!(parse(&["scene.gltf", "--width", "0"]).is_err());
        assert!(parse(&["scene.gltf", "--frobnicate"]).is_err());
    }

    #[test]
    fn flat_scenes_are_framed_from_the_side() {
        let bounds = Some((Vec3::ZERO, Vec3::new(2.0, 2.0, 0.0)));
        let camera = frame_scene(bounds, Vec3::Y);
        assert!(camera.eye.abs_diff_eq(Vec3::new(1.0, 1.0, 4.0), 1e-6));
        assert!(camera.center.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));

        let deep = Some((Vec3::ZERO, Vec3::ONE));
        let camera = frame_scene(deep, Vec3::Y);
        assert!(camera.eye.abs_diff_eq(Vec3::new(1.5, 1.5, 1.5), 1e-6));
    }
}
