//! Configuration types and loading for docpipe

mod loader;
mod workflow;

#[allow(unused_imports)]
pub use loader::{DocpipeConfig, ManagerConfig, StoreConfig};
#[allow(unused_imports)]
pub use workflow::{PipelineConfig, StageConfig};
