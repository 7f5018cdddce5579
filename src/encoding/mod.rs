//! # Encoding Module
//!
//! Byte-comparable key encoding for index trees:
//!
//! - **Key encoding**: big-endian, order-preserving field encodings that
//!   compound indexes concatenate into self-delimited keys

pub mod key;
