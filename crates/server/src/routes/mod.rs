mod health;
mod provision;

pub use health::*;
pub use provision::*;
