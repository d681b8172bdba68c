use glam::Vec3;
use sdl2::keyboard::Scancode;

use crate::input::InputState;

use super::{Camera, CameraController, DragTracker};

/// Keyboard-driven fly camera: W/S dolly, A/D truck, Up/Down pedestal, Q/E
/// roll, middle-drag pans and tilts. Translation speed is in world units per
/// second.
pub struct FirstPersonController {
    camera: Camera,
    world_up: Vec3,
    speed: f32,
    drag: DragTracker,
}

impl FirstPersonController {
    pub fn new(camera: Camera, world_up: Vec3, speed: f32) -> FirstPersonController {
        FirstPersonController {
            camera,
            world_up,
            speed,
            drag: DragTracker::new(),
        }
    }
}

impl CameraController for FirstPersonController {
    fn update(&mut self, input: &InputState, elapsed: f32) -> bool {
        let cursor_delta = self.drag.delta(input);

        let mut truck_left = 0.0;
        let mut pedestal_up = 0.0;
        let mut dolly_in = 0.0;
        let mut roll_right = 0.0;

        if input.key(Scancode::W) {
            dolly_in += self.speed * elapsed;
        }
        if input.key(Scancode::S) {
            dolly_in -= self.speed * elapsed;
        }
        if input.key(Scancode::A) {
            truck_left += self.speed * elapsed;
        }
        if input.key(Scancode::D) {
            truck_left -= self.speed * elapsed;
        }
        if input.key(Scancode::Up) {
            pedestal_up += self.speed * elapsed;
        }
        if input.key(Scancode::Down) {
            pedestal_up -= self.speed * elapsed;
        }
        if input.key(Scancode::Q) {
            roll_right -= 0.001;
        }
        if input.key(Scancode::E) {
            roll_right += 0.001;
        }

        // Cursor going right pans the view left.
        let pan_left = -0.01 * cursor_delta.x;
        let tilt_down = 0.01 * cursor_delta.y;

        let has_moved = truck_left != 0.0
            || pedestal_up != 0.0
            || dolly_in != 0.0
            || pan_left != 0.0
            || tilt_down != 0.0
            || roll_right != 0.0;
        if !has_moved {
            return false;
        }

        self.camera.move_local(truck_left, pedestal_up, dolly_in);
        self.camera.rotate_local(roll_right, tilt_down, 0.0);
        self.camera.rotate_world(pan_left, self.world_up);
        true
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn controller() -> FirstPersonController {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        FirstPersonController::new(camera, Vec3::Y, 2.0)
    }

    #[test]
    fn idle_input_reports_no_movement() {
        let mut controller = controller();
        let before = controller.camera();
        let input = InputState::synthetic(&[], Vec2::ZERO, false);
        assert!(!controller.update(&input, 0.016));
        assert_eq!(controller.camera(), before);
    }

    #[test]
    fn dolly_scales_with_speed_and_elapsed_time() {
        let mut controller = controller();
        let input = InputState::synthetic(&[Scancode::W], Vec2::ZERO, false);
        assert!(controller.update(&input, 0.5));
        // speed 2.0 for half a second moves one unit along -Z.
        assert!(controller
            .camera()
            .eye
            .abs_diff_eq(Vec3::new(0.0, 0.0, 4.0), 1e-5));
    }

    #[test]
    fn drag_pans_about_the_world_up_axis() {
        let mut controller = controller();
        let press = InputState::synthetic(&[], Vec2::new(100.0, 100.0), true);
        controller.update(&press, 0.016);
        let drag = InputState::synthetic(&[], Vec2::new(110.0, 100.0), true);
        assert!(controller.update(&drag, 0.016));
        let camera = controller.camera();
        assert_eq!(camera.eye, Vec3::new(0.0, 0.0, 5.0), "pan keeps the eye");
        assert!(camera.front().x != 0.0, "view turned sideways");
        assert!((camera.front().y).abs() < 1e-5, "no tilt from a pure pan");
    }

    #[test]
    fn pose_survives_a_controller_swap() {
        let mut controller = controller();
        let input = InputState::synthetic(&[Scancode::W], Vec2::ZERO, false);
        controller.update(&input, 1.0);
        let pose = controller.camera();

        let mut replacement = super::super::TrackballController::new(
            Camera::new(Vec3::ONE, Vec3::ZERO, Vec3::Y),
            Vec3::Y,
        );
        replacement.set_camera(pose);
        assert_eq!(replacement.camera(), pose);
    }
}
