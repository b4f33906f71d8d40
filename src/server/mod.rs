pub mod builder;
pub mod handler;
pub mod instance;
pub mod listener;

pub use builder::ServerBuilder;
pub use handler::ConnectionHandler;
pub use instance::Balancer;
