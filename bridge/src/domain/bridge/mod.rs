pub mod outcome;
pub mod path;
pub mod request;

pub use outcome::{Failure, FailureKind, OutboundEvent, Outcome};
pub use path::{PathError, SourcePath};
pub use request::{DeliveryMode, Request, RequestKind, SubscriptionId};
