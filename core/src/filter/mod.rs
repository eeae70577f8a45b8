pub mod background;
pub mod blur;
pub mod contours;
pub mod corners;
pub mod edges;
pub mod equalize;
pub mod features;
pub mod motion;
pub mod optflow;
pub mod skin;
pub mod threshold;
pub mod traits;

mod ops;

#[cfg(test)]
pub(crate) mod testing;
