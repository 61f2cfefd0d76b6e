use nalgebra::{Quaternion, Rotation3, UnitQuaternion};
use rand::Rng;
use std::f64::consts::TAU;

/// Uniformly distributed random rotation (Shoemake's subgroup algorithm on unit
/// quaternions).
pub fn random_rotation<R: Rng + ?Sized>(rng: &mut R) -> Rotation3<f64> {
    let u1: f64 = rng.r#gen();
    let u2: f64 = rng.r#gen();
    let u3: f64 = rng.r#gen();

    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    let q = Quaternion::new(
        b * (TAU * u3).cos(),
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
    );
    UnitQuaternion::from_quaternion(q).to_rotation_matrix()
}

/// Rotation from roll/pitch/yaw angles in degrees (applied about x, then y, then z).
pub fn rotation_from_euler_degrees(roll: f64, pitch: f64, yaw: f64) -> Rotation3<f64> {
    Rotation3::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
}
