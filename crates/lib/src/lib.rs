//! BubbleChat core library: provider-abstracted message dispatch and session persistence,
//! plus the config, i18n, and platform helpers the front ends share.

pub mod config;
pub mod i18n;
pub mod init;
pub mod llm;
pub mod message;
pub mod platform;
pub mod session;
pub mod storage;
