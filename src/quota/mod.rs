pub mod config;
pub mod extract;
pub mod inference;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod reading;
pub mod retention;
pub mod scan;
pub mod signal;
pub mod state;
pub mod util;
pub mod validate;
pub mod watcher;
