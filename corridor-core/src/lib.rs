pub mod artifact;
pub mod cancel;
pub mod crs;
pub mod geometry;
pub mod progress;
pub mod sampling;
pub mod stats;
