pub mod context;
pub mod error;
pub mod shutdown;

pub use context::AppContext;
pub use error::{GatorError, Result};
pub use shutdown::{Shutdown, ShutdownTrigger};
