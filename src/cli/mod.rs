pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod rehearse;
pub mod run;
pub mod runtime;
pub mod rut;

pub use app::run;
