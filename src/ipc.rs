pub mod pipeline;
pub mod runtime;
pub mod server;
