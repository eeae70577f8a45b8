pub mod error;
pub mod filter;
pub mod registry;
pub mod session;
pub mod state;

pub use error::{SessionError, TransformError};
pub use filter::traits::Transform;
pub use registry::{FilterDescriptor, FilterRegistry};
pub use session::{FilterSession, Outcome, Selection};
pub use state::TransformState;
