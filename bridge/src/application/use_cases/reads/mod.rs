pub mod read_feed;
pub mod read_item;
