//! Live-reload server.
//!
//! Runs only when a proxy target is configured.
//!
//! ## Endpoints
//!
//! - `GET /__livereload` - WebSocket; receives `{"type":"reload",...}` after each rebuild
//! - `GET /__livereload.js` - Client script that connects to the socket
//! - `GET /assets/*` - Static files from the build root
//! - everything else - Reverse-proxied to the target, with the client script
//!   injected into HTML responses

mod proxy;
mod reload;
mod routes;

pub use proxy::{inject_client_script, normalize_target};
pub use reload::{ReloadEvent, ReloadHub, CLIENT_SCRIPT_PATH, SOCKET_PATH};
pub use routes::{router, serve, AppState};
