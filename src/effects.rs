pub mod accel;
pub mod adjust;
pub mod blur;
pub mod composite;
pub mod filter;
pub mod library;
pub mod manipulate;
pub mod pixel_ops;
pub mod region;
