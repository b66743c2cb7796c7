pub mod components;
pub mod config;
pub mod framework;
pub mod graph;
pub mod kpi;
pub mod model;
pub mod mpc;
pub mod recorder;
pub mod scalar;
pub mod time;
