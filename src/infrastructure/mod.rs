//! Infrastructure layer: container backends, I/O implementations and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod container;
pub mod di;
pub mod error;
pub mod local;
pub mod memory;
pub mod net;
pub mod traits;

pub use container::{Container, ExecRequest};
pub use error::{ContainerError, ContainerResult};
pub use local::LocalContainer;
pub use memory::InMemoryContainer;
