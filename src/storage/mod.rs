pub mod arena;
pub mod segment;
pub mod shared_string;

pub use arena::{Arena, ArenaHandle, ArenaPtr, ArenaStats};
pub use shared_string::SharedString;
