pub mod progress;
pub mod summary;
pub mod utils;
