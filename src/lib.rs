// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) parses arguments and dispatches into `commands`.
//
// Module responsibilities:
// - `api`: Blocking transport for the server REST API (versioned URLs,
//   auth-token header, XML and multipart/mixed bodies, status checking).
// - `xml`: tsRequest builders and tsResponse parsers.
// - `session`: Sign-in/sign-out lifecycle; owns the session token.
// - `workbook`: Name→ID lookups, download, publish, move and delete.
// - `commands`: The three migration scenarios and their cleanup ordering.
// - `cli`: clap argument surface and the password prompt.
// - `error`: Typed failure taxonomy shared by all of the above.
pub mod api;
pub mod cli;
pub mod commands;
pub mod error;
pub mod session;
pub mod workbook;
pub mod xml;
