//! Authentication module for the file index server

pub mod middleware;
pub mod migrations;
pub mod oauth;
pub mod routes;
pub mod session;
