pub mod frame;

pub use frame::{Frame, PixelLayout, Rotation};
