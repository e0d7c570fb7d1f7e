// Module layout (Clean Architecture style)
// - bootstrap: configuration and startup
// - infrastructure: data source and outbound channel adapters
// - presentation: HTTP/WS handlers and routing
// - application: ports, the bridge service and read use cases
// - domain: core models

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
