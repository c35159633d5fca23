// Library interface for techpulse modules
// This allows tests and the binary to import modules

pub mod article;
pub mod backend;
pub mod chat;
