pub type Intensity = f64;
pub type Angle     = f64; // radians
pub type Coord     = f64; // pixel units, cell-corner convention
pub type Weight    = f64;

/// Volume of samples, shape (N, N, z). z is a pure batch dimension.
pub type Field = ndarray::Array3<Intensity>;

/// Projections, shape (num_rays, num_angles, z).
pub type Sinogram = ndarray::Array3<Intensity>;

pub const PI: Angle = std::f64::consts::PI;
