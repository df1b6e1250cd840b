//! Shared data models

pub mod device;
pub mod location;
pub mod redemption;
pub mod reward;
pub mod user;
pub mod verdict;

pub use device::*;
pub use location::*;
pub use redemption::*;
pub use reward::*;
pub use user::*;
pub use verdict::*;
