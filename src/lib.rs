#![doc = include_str!("../README.md")]

pub mod error;
pub mod interfaces;
pub mod ndr;
pub mod port;
pub mod rpc;
pub mod stream;

pub use error::{AlpcRpcError, Result};
