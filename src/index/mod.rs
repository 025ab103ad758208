pub mod key;
pub mod positional;

pub use key::{PositionalKey, ReverseKey};
pub use positional::{IndexStats, PositionalIndex};
