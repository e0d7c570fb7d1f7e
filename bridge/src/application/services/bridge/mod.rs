mod gate;
pub mod policy;
pub mod read;
pub mod service;

pub use policy::DeliveryPolicy;
pub use read::read_bounded;
pub use service::{Bridge, SubscriptionHandle};
