//! Routing metadata resolution.
//!
//! Turns a session identifier into a concrete backend address through a
//! short chain of point reads: session to subgrid, subgrid to loaded model
//! type, and model type to an address. Each step either succeeds or the
//! request fails closed; the single exception is the model type read, which
//! falls back to the baseline type for deployments that predate the concept.

mod address;
mod model_type;
mod resolver;

pub use address::{BackendAddr, InvalidBackendAddr};
pub use model_type::{ModelType, UnknownModelType};
pub use resolver::{AddressSource, RouteError, RouteResolver, WorkloadSource};
