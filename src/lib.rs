// Library root
// -----------
// The binary (`main.rs`) parses flags and hands off to `ui`.
//
// Module responsibilities:
// - `retry`: bounded retry loop with backoff and the request error type.
// - `proxy`: proxy URI classification and round-robin assignment.
// - `api`: blocking HTTP client for one account (status, check-in, upload).
// - `runner`: the per-account task sequence.
// - `orchestrator`: passes over the token list and the daily loop.
// - `files`: token/proxy list readers and the token store.
// - `config`: TOML settings.
// - `ui`: menu and status line.
pub mod api;
pub mod config;
pub mod files;
pub mod orchestrator;
pub mod proxy;
pub mod retry;
pub mod runner;
pub mod ui;
