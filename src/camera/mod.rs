use glam::{Mat4, Vec2, Vec3};

use crate::input::InputState;

mod first_person;
mod trackball;

pub use first_person::FirstPersonController;
pub use trackball::TrackballController;

/// Camera pose in canonical look-at form. Every transform rewrites these
/// three vectors; nothing is accumulated incrementally, so there is no
/// hidden state to drift.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn new(eye: Vec3, center: Vec3, up: Vec3) -> Camera {
        Camera { eye, center, up }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.center, self.up)
    }

    pub fn front(&self) -> Vec3 {
        (self.center - self.eye).normalize()
    }

    pub fn left(&self) -> Vec3 {
        self.up.cross(self.front()).normalize()
    }

    /// Translates eye and center together along the camera's own axes.
    pub fn move_local(&mut self, truck_left: f32, pedestal_up: f32, dolly_in: f32) {
        let translation =
            truck_left * self.left() + pedestal_up * self.up + dolly_in * self.front();
        self.eye += translation;
        self.center += translation;
    }

    /// Rotates the view direction and up vector about the camera's own
    /// front, left and up axes, keeping the eye in place.
    pub fn rotate_local(&mut self, roll_right: f32, tilt_down: f32, pan_left: f32) {
        let rotation = Mat4::from_axis_angle(self.front(), roll_right)
            * Mat4::from_axis_angle(self.left(), tilt_down)
            * Mat4::from_axis_angle(self.up, pan_left);
        self.center = self.eye + rotation.transform_vector3(self.center - self.eye);
        self.up = rotation.transform_vector3(self.up);
    }

    /// Rotates the view direction about a world-space axis through the eye.
    pub fn rotate_world(&mut self, angle: f32, axis: Vec3) {
        let rotation = Mat4::from_axis_angle(axis, angle);
        self.center = self.eye + rotation.transform_vector3(self.center - self.eye);
        self.up = rotation.transform_vector3(self.up);
    }
}

/// The capability both camera models implement. `update` consumes one tick
/// of input and reports whether any of it produced a non-zero pose delta.
pub trait CameraController {
    fn update(&mut self, input: &InputState, elapsed: f32) -> bool;
    fn camera(&self) -> Camera;
    /// Used to carry the pose across a controller swap.
    fn set_camera(&mut self, camera: Camera);
}

/// Tracks a press/release edge on the drag button and yields the cursor
/// delta while the drag is engaged. Both controllers poll this rather than
/// listening for motion events.
pub(crate) struct DragTracker {
    engaged: bool,
    last_position: Vec2,
}

impl DragTracker {
    pub fn new() -> DragTracker {
        DragTracker {
            engaged: false,
            last_position: Vec2::ZERO,
        }
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    pub fn delta(&mut self, input: &InputState) -> Vec2 {
        let position = input.mouse_position();
        if input.middle_button() && !self.engaged {
            self.engaged = true;
            self.last_position = position;
        } else if !input.middle_button() && self.engaged {
            self.engaged = false;
        }
        if self.engaged {
            let delta = position - self.last_position;
            self.last_position = position;
            delta
        } else {
            Vec2::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
    }

    #[test]
    fn pose_round_trips_through_construction() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let center = Vec3::new(-4.0, 0.5, 6.0);
        let up = Vec3::new(0.0, 1.0, 0.0);
        let camera = Camera::new(eye, center, up);
        assert_eq!(camera.eye, eye);
        assert_eq!(camera.center, center);
        assert_eq!(camera.up, up);
    }

    #[test]
    fn front_and_left_form_the_expected_frame() {
        let camera = camera();
        assert!(camera.front().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(camera.left().abs_diff_eq(Vec3::NEG_X, 1e-6));
    }

    #[test]
    fn dolly_moves_eye_and_center_together() {
        let mut camera = camera();
        camera.move_local(0.0, 0.0, 2.0);
        assert!(camera.eye.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-6));
        assert!(camera.center.abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), 1e-6));
    }

    #[test]
    fn world_rotation_preserves_distance_to_center() {
        let mut camera = camera();
        let before = (camera.center - camera.eye).length();
        camera.rotate_world(0.7, Vec3::Y);
        let after = (camera.center - camera.eye).length();
        assert!((before - after).abs() < 1e-5);
        assert_eq!(camera.eye, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn local_tilt_keeps_the_eye_fixed() {
        let mut camera = camera();
        camera.rotate_local(0.0, 0.3, 0.0);
        assert_eq!(camera.eye, Vec3::new(0.0, 0.0, 5.0));
        // Tilting down turns the view below the horizon.
        assert!(camera.front().y < 0.0);
    }

    #[test]
    fn drag_tracker_reports_deltas_only_while_engaged() {
        let mut tracker = DragTracker::new();
        let released = InputState::synthetic(&[], Vec2::new(10.0, 10.0), false);
        assert_eq!(tracker.delta(&released), Vec2::ZERO);

        let pressed = InputState::synthetic(&[], Vec2::new(10.0, 10.0), true);
        // The press edge only latches the cursor position.
        assert_eq!(tracker.delta(&pressed), Vec2::ZERO);

        let dragged = InputState::synthetic(&[], Vec2::new(13.0, 8.0), true);
        assert_eq!(tracker.delta(&dragged), Vec2::new(3.0, -2.0));

        let released = InputState::synthetic(&[], Vec2::new(20.0, 20.0), false);
        assert_eq!(tracker.delta(&released), Vec2::ZERO);
        assert!(!tracker.engaged());
    }
}
