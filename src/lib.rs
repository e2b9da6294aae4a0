//! Portfolio chat service: visitor conversations answered by an automated
//! responder until the site owner takes over.

pub mod auth;
pub mod bus;
pub mod chat;
pub mod client;
pub mod config;
pub mod content;
pub mod entity;
pub mod error;
pub mod manager;
pub mod presence;
pub mod responder;
pub mod store;
pub mod web;
