pub mod http;
mod portpicker;
pub mod random;
mod reachable;
pub mod temp;

// re-export
pub use portpicker::{pick_unused_local_port, pick_unused_port};
pub use reachable::{is_reachable, is_reachable_within};
