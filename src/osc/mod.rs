pub mod message;
pub mod sink;

pub use sink::OscChatboxSink;
