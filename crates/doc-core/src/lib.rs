mod core;
mod editing;
mod error;
mod identity;
mod markup;
mod node;
mod normalize;
mod ops;
pub mod path;
mod plugin;
pub mod plugins;
mod serde_value;
mod serialize;
mod table_headers;

pub use crate::core::*;
pub use crate::error::*;
pub use crate::identity::*;
pub use crate::markup::*;
pub use crate::node::*;
pub use crate::normalize::{is_normalized, normalize};
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::serde_value::*;
pub use crate::serialize::*;
pub use crate::table_headers::*;
