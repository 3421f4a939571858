pub mod domain;
pub mod result;

pub use domain::*;
pub use result::*;
