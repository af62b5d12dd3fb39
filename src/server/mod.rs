pub mod responses;
pub mod server;
