//! Front ends for transcript search: the `atp-search` CLI and the
//! `atp-server` HTTP endpoint share argument mapping and startup wiring.

pub mod args;
pub mod server;
pub mod startup;
