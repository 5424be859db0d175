pub mod markup;
pub mod non_empty_vec;
pub mod options;

pub use markup::Segment;
pub use non_empty_vec::NonEmptyVec;
pub use options::{RadioOption, SelectOption, SelectOptions};
