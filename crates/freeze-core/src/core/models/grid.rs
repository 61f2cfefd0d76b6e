use nalgebra::Vector3;

/// Voxel-to-world mapping of a dense grid.
///
/// The grid covers the world box `[origin, origin + shape * spacing]`; the centre of voxel
/// `(i, j, k)` sits at `origin + ((i, j, k) + 0.5) * spacing`. Storage is x-fastest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub shape: [usize; 3],
    pub spacing: Vector3<f64>,
    pub origin: Vector3<f64>,
}

impl GridGeometry {
    pub fn new(shape: [usize; 3], spacing: Vector3<f64>, origin: Vector3<f64>) -> Self {
        Self {
            shape,
            spacing,
            origin,
        }
    }

    pub fn cubic(shape: [usize; 3], voxel_size: f64) -> Self {
        Self::new(shape, Vector3::repeat(voxel_size), Vector3::zeros())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    /// Voxel count, or `None` if the product overflows or the buffer could not be allocated.
    pub fn checked_len(&self) -> Option<usize> {
        let len = self
            .shape
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))?;
        len.checked_mul(size_of::<f64>())
            .filter(|bytes| *bytes <= isize::MAX as usize)
            .map(|_| len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.shape[1] + j) * self.shape[0] + i
    }

    pub fn voxel_center(&self, i: usize, j: usize, k: usize) -> Vector3<f64> {
        let ijk = Vector3::new(i as f64, j as f64, k as f64);
        self.origin + (ijk + Vector3::repeat(0.5)).component_mul(&self.spacing)
    }

    /// Continuous voxel coordinates of a world position; integers land on voxel centres.
    #[inline]
    pub fn world_to_voxel(&self, position: &Vector3<f64>) -> Vector3<f64> {
        (position - self.origin).component_div(&self.spacing) - Vector3::repeat(0.5)
    }

    pub fn world_min(&self) -> Vector3<f64> {
        self.origin
    }

    pub fn world_max(&self) -> Vector3<f64> {
        let extent = Vector3::new(
            self.shape[0] as f64,
            self.shape[1] as f64,
            self.shape[2] as f64,
        );
        self.origin + extent.component_mul(&self.spacing)
    }

    pub fn voxel_volume(&self) -> f64 {
        self.spacing.x * self.spacing.y * self.spacing.z
    }
}

/// Dense accumulation buffer of density values.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    geometry: GridGeometry,
    data: Vec<f64>,
}

impl VoxelGrid {
    pub fn zeros(geometry: GridGeometry) -> Self {
        Self {
            data: vec![0.0; geometry.len()],
            geometry,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn shape(&self) -> [usize; 3] {
        self.geometry.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        let [nx, ny, nz] = self.geometry.shape;
        if i < nx && j < ny && k < nz {
            Some(self.data[self.geometry.index(i, j, k)])
        } else {
            None
        }
    }

    /// Adds `value` at `(i, j, k)`; returns `false` (and discards the value) when the
    /// voxel lies outside the grid.
    pub fn add(&mut self, i: isize, j: isize, k: isize, value: f64) -> bool {
        let [nx, ny, nz] = self.geometry.shape;
        if i < 0 || j < 0 || k < 0 {
            return false;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i >= nx || j >= ny || k >= nz {
            return false;
        }
        let index = self.geometry.index(i, j, k);
        self.data[index] += value;
        true
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }

    pub fn variance(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.data.len() as f64
    }

    pub fn into_parts(self) -> (GridGeometry, Vec<f64>) {
        (self.geometry, self.data)
    }
}
