pub mod data_source;
pub mod response_publisher;
