use crate::core::models::bounds::BoundingSphere;
use crate::core::models::ids::InstanceId;
use nalgebra::Vector3;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SecondaryMap;

type CellKey = (i64, i64, i64);

/// Uniform hash grid over bounding spheres.
///
/// A sphere is registered in every cell touched by its axis-aligned bounding box, so two
/// intersecting spheres always share at least one cell: queries never miss a true
/// overlap, though they may return candidates that do not overlap.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    inv_cell_size: f64,
    cells: FxHashMap<CellKey, Vec<InstanceId>>,
    spheres: SecondaryMap<InstanceId, BoundingSphere>,
}

impl SpatialIndex {
    /// `cell_size` should be close to the typical entity diameter. Non-positive values fall
    /// back to unit cells.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: FxHashMap::default(),
            spheres: SecondaryMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.spheres.contains_key(id)
    }

    pub fn bounds(&self, id: InstanceId) -> Option<&BoundingSphere> {
        self.spheres.get(id)
    }

    pub fn insert(&mut self, id: InstanceId, sphere: BoundingSphere) {
        if sphere.is_degenerate() {
            tracing::warn!(?id, "Refusing to index a degenerate bounding sphere.");
            return;
        }
        let (lo, hi) = self.cell_bounds(&sphere);
        for key in covered_cells(lo, hi) {
            self.cells.entry(key).or_default().push(id);
        }
        self.spheres.insert(id, sphere);
    }

    /// Ids of every indexed instance whose sphere could intersect `sphere`.
    ///
    /// Visits whichever is smaller: the cells covered by `sphere` or the occupied cells.
    pub fn query(&self, sphere: &BoundingSphere) -> FxHashSet<InstanceId> {
        let mut candidates = FxHashSet::default();
        if sphere.is_degenerate() {
            return candidates;
        }
        let (lo, hi) = self.cell_bounds(sphere);
        let covered = (0..3).fold(1.0, |acc, a| {
            acc * (axis(hi, a) as f64 - axis(lo, a) as f64 + 1.0)
        });
        if covered > self.cells.len() as f64 {
            let inside = |key: &CellKey| {
                (0..3).all(|a| (axis(lo, a)..=axis(hi, a)).contains(&axis(*key, a)))
            };
            for (_, ids) in self.cells.iter().filter(|(key, _)| inside(key)) {
                candidates.extend(ids.iter().copied());
            }
        } else {
            for key in covered_cells(lo, hi) {
                if let Some(ids) = self.cells.get(&key) {
                    candidates.extend(ids.iter().copied());
                }
            }
        }
        candidates
    }

    /// First indexed instance whose surface gap to `sphere` is below `tolerance`.
    pub fn find_conflict(&self, sphere: &BoundingSphere, tolerance: f64) -> Option<InstanceId> {
        let reach = sphere.inflated(tolerance.max(0.0));
        self.query(&reach).into_iter().find(|id| {
            self.bounds(*id)
                .is_some_and(|other| sphere.separation(other) < tolerance)
        })
    }

    fn cell_of(&self, p: &Vector3<f64>) -> CellKey {
        (
            (p.x * self.inv_cell_size).floor() as i64,
            (p.y * self.inv_cell_size).floor() as i64,
            (p.z * self.inv_cell_size).floor() as i64,
        )
    }

    fn cell_bounds(&self, sphere: &BoundingSphere) -> (CellKey, CellKey) {
        let (lo, hi) = sphere.aabb();
        (self.cell_of(&lo), self.cell_of(&hi))
    }
}

#[inline]
fn axis(key: CellKey, a: usize) -> i64 {
    match a {
        0 => key.0,
        1 => key.1,
        _ => key.2,
    }
}

fn covered_cells(lo: CellKey, hi: CellKey) -> impl Iterator<Item = CellKey> {
    (lo.2..=hi.2).flat_map(move |z| {
        (lo.1..=hi.1).flat_map(move |y| (lo.0..=hi.0).map(move |x| (x, y, z)))
    })
}
