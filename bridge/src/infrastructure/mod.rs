pub mod outbound;
pub mod source;
