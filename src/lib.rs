pub mod catalog;
pub mod clarify;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fusion;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod tripod;
pub mod tui;

pub use clarify::derive_labels;
pub use fusion::fuse;
pub use pipeline::run;
