pub mod http;
mod portpicker;

// re-export
pub use portpicker::{pick_unused_local_port, pick_unused_port};
