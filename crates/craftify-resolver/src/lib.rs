mod code;
mod error;
mod registry;
mod resolver;

pub use code::{OUTPUT_KEY, code_task_body};
pub use error::ResolveError;
pub use registry::{Handler, HandlerRegistry};
pub use resolver::{Resolver, StandardResolver};
