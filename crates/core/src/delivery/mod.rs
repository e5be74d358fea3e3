pub mod live_channel;
pub mod live_subscriber;
pub mod subscriber_registry;
