mod channel_publisher;

pub use channel_publisher::ChannelResponsePublisher;
