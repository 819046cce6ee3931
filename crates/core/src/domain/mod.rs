mod metadata;
mod provision;
mod slug;
mod system;

pub use metadata::*;
pub use provision::*;
pub use slug::*;
pub use system::*;
