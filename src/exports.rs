pub use crate::types::{Intensity, Angle, Field, Sinogram};
pub use crate::error::{Error, Result};
pub use crate::geometry::Geometry;
pub use crate::projector::{
    ExecutionContext, Projector,
    project, backproject, project_2d, backproject_2d, uniform_angles,
};
pub use crate::filter::{filter_sinogram, filtered_backproject, filtered_backproject_2d, ramp_filter};
pub use crate::config::{read_config_file, Config};
