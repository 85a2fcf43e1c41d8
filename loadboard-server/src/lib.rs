#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

//! Loadboard chat server: write procedures and the polling event stream.

pub mod app_state;
pub mod auth;
pub mod commands;
pub mod db;
pub mod handlers;
pub mod http;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod tracer;

#[cfg(test)]
mod test_support;
