pub mod errors;
pub mod version;

pub use errors::*;
pub use version::*;
