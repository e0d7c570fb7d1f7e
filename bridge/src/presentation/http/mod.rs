pub mod health;
pub mod reads;
