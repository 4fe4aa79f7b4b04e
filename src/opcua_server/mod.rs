pub mod browse;
pub mod namespace;
pub mod server;
pub mod sink;

pub use browse::log_devices;
pub use namespace::load_namespace;
pub use server::{build_server, spawn_server, wait_for_shutdown};
pub use sink::AddressSpaceSink;
