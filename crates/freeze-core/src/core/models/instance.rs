use super::bounds::BoundingSphere;
use super::ids::InstanceId;
use super::pose::Pose;

/// One accepted occurrence of an entity template.
///
/// `entity` indexes the caller's entity list; the template itself stays owned by the
/// caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedInstance {
    pub id: InstanceId,
    pub entity: usize,
    pub pose: Pose,
    pub bounds: BoundingSphere,
}
