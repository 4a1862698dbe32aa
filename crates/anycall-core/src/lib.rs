//! Anycall Core
//!
//! Typed payloads carried through the AnycallProxy entry point and the ABI
//! codec that turns them into call data: the `AnycallInfo` swap tuple used by
//! the trade proxies and the XCM transfer tuple used by the XCM proxy.

pub mod error;
pub mod swap;
pub mod xcm;
pub mod entry_point;
pub mod payload;

pub use error::CodecError;
pub use swap::{PayloadLayout, SwapMode, SwapPayload};
pub use xcm::{Junction, MultiLocation, XcmTransferPayload};
pub use entry_point::EntryPoint;
pub use payload::Payload;
