mod enrollment;
mod offering;
mod primitives;
mod waitlist;

pub use enrollment::*;
pub use offering::*;
pub use primitives::*;
pub use waitlist::*;
