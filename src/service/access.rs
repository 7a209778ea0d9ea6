use crate::models::usermodel::Profile;

/// Whether `profile` may enter a view that needs `required_points`. A zero
/// requirement admits every signed-in profile.
pub fn has_required_points(profile: &Profile, required_points: i64) -> bool {
    required_points <= 0 || profile.points >= required_points
}
