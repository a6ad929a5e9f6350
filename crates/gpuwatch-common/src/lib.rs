pub mod address;
pub mod server_status;

pub use address::{AddressError, ServerAddress};
pub use server_status::{GpuTemperature, ServerSnapshot, ServerState, ServerStatus};

pub mod telemetry;
