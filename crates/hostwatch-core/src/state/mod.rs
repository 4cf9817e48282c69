// # Store Implementations
//
// In-process implementations of the HostStore and ResourceRepository
// traits. Deployments backed by a real control-plane database provide
// their own.

pub mod file;
pub mod memory;
pub mod resources;

pub use file::FileHostStore;
pub use memory::MemoryHostStore;
pub use resources::MemoryResourceStore;
