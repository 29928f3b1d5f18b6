pub mod clock;
pub mod hash;

pub use clock::{Clock, ManualClock, SystemClock};
pub use hash::HashFunction;
