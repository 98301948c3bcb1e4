pub mod chatbox;
pub mod spotify;
