#![doc = include_str!("../README.md")]

mod bytes;
mod error;

pub mod ber;
pub mod framing;
pub mod image;
pub mod spacepacket;
pub mod timecode;

pub use error::{Error, Result};
