pub mod cancel;
pub mod color;
pub mod config;
pub mod effects;
pub mod effectspec;
pub mod pacer;
pub mod queue;
pub mod server;
pub mod sink;
