mod base;
mod connection;
mod provider;
mod retry;

pub use base::*;
pub use connection::*;
pub use provider::*;
pub use retry::*;
