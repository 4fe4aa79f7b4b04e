pub mod device;
pub mod physics;
pub mod sensor_loop;

pub use sensor_loop::start;
