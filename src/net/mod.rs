//! TCP transport for the hub

pub mod connection;
pub mod server;

pub use connection::{ChannelConnection, Outbound, TcpConnection};
pub use server::{serve_connection, HubServer};
