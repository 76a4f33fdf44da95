pub mod cli;
pub mod client;
pub mod protocol;
pub mod retry;

mod utilities;

pub use cli::{Input, prompt};
pub use client::{Client, ClientConfig, ConnectError, Watcher};
pub use protocol::{Command, ErrorKind, Response, ResponseError, WireError};
