pub mod anomaly;
pub mod autoplay;
pub mod compose;
pub mod config;
pub mod context;
pub mod engine;
pub mod graph;
pub mod interpreter;
pub mod lint;
pub mod progression;
pub mod script;
pub mod session;
