pub mod bridge;
pub mod detector;
pub mod fetcher;
pub mod snapshot;

pub use bridge::NowPlayingBridge;
