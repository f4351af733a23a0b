pub mod config;
pub mod run;
pub mod stats;
pub mod template;
