//! Command handlers for kubectl-login

pub mod login;
pub mod profiles;
pub mod shell;
