use glam::{Mat4, Vec3};

use crate::input::InputState;

use super::{Camera, CameraController, DragTracker};

/// Orbit camera: middle-drag rotates the eye around the look-at center,
/// Shift-drag pans in the camera plane, Ctrl-drag dollies along the view
/// vector. The pose is rebuilt from (eye, center, world up) after every
/// transform.
pub struct TrackballController {
    camera: Camera,
    world_up: Vec3,
    drag: DragTracker,
}

impl TrackballController {
    pub fn new(camera: Camera, world_up: Vec3) -> TrackballController {
        TrackballController {
            camera,
            world_up,
            drag: DragTracker::new(),
        }
    }
}

impl CameraController for TrackballController {
    fn update(&mut self, input: &InputState, _elapsed: f32) -> bool {
        let cursor_delta = self.drag.delta(input);
        if !self.drag.engaged() {
            return false;
        }

        if input.shift() {
            // Pan in the camera's local plane.
            let truck_left = 0.01 * cursor_delta.x;
            let pedestal_up = 0.01 * cursor_delta.y;
            if truck_left == 0.0 && pedestal_up == 0.0 {
                return false;
            }
            self.camera.move_local(truck_left, pedestal_up, 0.0);
            return true;
        }

        if input.ctrl() {
            // Dolly towards or away from the center, never through it.
            let mut offset = 0.01 * cursor_delta.x;
            if offset == 0.0 {
                return false;
            }
            if offset > 0.0 {
                offset = offset.min(1.0 - 1e-4);
            }
            let view_vector = self.camera.center - self.camera.eye;
            let front = view_vector / view_vector.length();
            let new_eye = self.camera.eye + offset * front;
            self.camera = Camera::new(new_eye, self.camera.center, self.world_up);
            return true;
        }

        // Rotate: latitude about the world up axis, longitude about the
        // camera's local left axis.
        let latitude_angle = -0.01 * cursor_delta.x;
        let longitude_angle = 0.01 * cursor_delta.y;
        if latitude_angle == 0.0 && longitude_angle == 0.0 {
            return false;
        }
        let depth_axis = self.camera.eye - self.camera.center;
        let rotation = Mat4::from_axis_angle(self.world_up, latitude_angle)
            * Mat4::from_axis_angle(self.camera.left(), longitude_angle);
        let rotated_depth_axis = rotation.transform_vector3(depth_axis);
        let new_eye = self.camera.center + rotated_depth_axis;
        self.camera = Camera::new(new_eye, self.camera.center, self.world_up);
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
    use sdl2::keyboard::Scancode;

    fn controller() -> TrackballController {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        TrackballController::new(camera, Vec3::Y)
    }

    fn drag(controller: &mut TrackballController, keys: &[Scancode], delta: Vec2) -> bool {
        let press = InputState::synthetic(keys, Vec2::new(100.0, 100.0), true);
        controller.update(&press, 0.016);
        let dragged = InputState::synthetic(keys, Vec2::new(100.0, 100.0) + delta, true);
        controller.update(&dragged, 0.016)
    }

    #[test]
    fn released_button_never_moves_the_camera() {
        let mut controller = controller();
        let before = controller.camera();
        let input = InputState::synthetic(&[], Vec2::new(50.0, 50.0), false);
        assert!(!controller.update(&input, 0.016));
        assert_eq!(controller.camera(), before);
    }

    #[test]
    fn rotation_orbits_the_center_at_fixed_distance() {
        let mut controller = controller();
        assert!(drag(&mut controller, &[], Vec2::new(25.0, -10.0)));
        let camera = controller.camera();
        assert_eq!(camera.center, Vec3::ZERO, "center is fixed");
        assert!(((camera.eye - camera.center).length() - 5.0).abs() < 1e-4);
        assert_eq!(camera.up, Vec3::Y, "pose rebuilt against world up");
    }

    #[test]
    fn shift_drag_pans_center_and_eye_together() {
        let mut controller = controller();
        assert!(drag(
            &mut controller,
            &[Scancode::LShift],
            Vec2::new(10.0, 0.0),
        ));
        let camera = controller.camera();
        let offset = camera.eye - Vec3::new(0.0, 0.0, 5.0);
        assert!(offset.abs_diff_eq(camera.center, 1e-6), "both moved equally");
        assert!(offset.length() > 0.0);
    }

    #[test]
    fn ctrl_drag_dollies_along_the_view_vector() {
        let mut controller = controller();
        assert!(drag(
            &mut controller,
            &[Scancode::LCtrl],
            Vec2::new(200.0, 0.0),
        ));
        let camera = controller.camera();
        assert_eq!(camera.center, Vec3::ZERO);
        let distance = (camera.eye - camera.center).length();
        assert!(distance < 5.0, "moved towards the center");
        assert!(distance > 4.0, "inbound offset clamped below one unit");
    }
}
