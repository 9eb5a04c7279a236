//! Top-level test module for stageload
//!
//! This file organizes the library tests into categories.

mod csv_handler;
mod pipeline;
mod script;
mod validator;
