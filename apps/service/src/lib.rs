//! sitewatch - polls a fixed set of HTTP targets and TLS certificates and
//! pushes state changes to Telegram chats.

pub mod commands;
pub mod config;
pub mod http;
pub mod monitoring;
pub mod notifier;
