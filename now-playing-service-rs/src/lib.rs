pub mod adapters;
pub mod app_state;
pub mod config;
pub mod cycle;
pub mod extract;
pub mod http;
pub mod logging;
pub mod model;
pub mod one_liner;
pub mod registry;
pub mod render;
pub mod report;
pub mod snapshot;
pub mod status;
pub mod text;
