pub mod messages;
mod ws;

pub use ws::port_socket_entry;

// utoipa's generated path struct lives next to the handler.
pub use ws::__path_port_socket_entry;
