pub mod domain;
pub mod error;
pub mod presentation;
pub mod protocol;
pub mod session;
