mod class;
mod source;
mod chat;
mod document;
mod connection;

pub use class::*;
pub use source::*;
pub use chat::*;
pub use document::*;
pub use connection::*;
