use filter_deck_common::frame::Frame;

use crate::error::TransformError;
use crate::state::TransformState;

/// One per-frame image operation bound to a registry slot.
///
/// Implementations receive the incoming frame and the slot's mutable state
/// and either return the converted frame or report why they could not.
/// Stateless filters ignore `state`.
pub trait Transform: Send {
    fn apply(&self, frame: &Frame, state: &mut TransformState) -> Result<Frame, TransformError>;

    /// Whether the underlying algorithm can run in this build at all.
    fn availability(&self) -> Result<(), TransformError> {
        Ok(())
    }
}

/// Passes frames through untouched.
pub struct Unchanged;

impl Transform for Unchanged {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        Ok(frame.clone())
    }
}
