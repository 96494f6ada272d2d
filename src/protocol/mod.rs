//! Client wire protocol

pub mod message;

pub use message::{AckStatus, AdvisoryFrame, ClientMessage, EchoFrame, ServerFrame};
