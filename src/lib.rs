#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # hubrepl
//!
//! A Rust library for remote controlling a LEGO MINDSTORMS Inventor / SPIKE Prime hub from a
//! computer over its USB serial port.
//!
//! The hub runs a MicroPython interpreter. This library puts it into raw REPL mode and drives
//! it by sending small snippets of Python source: every method call on a proxy object becomes
//! `print(repr(hub.<path>.<method>(<args>)))`, and the printed literal is parsed back into a
//! [`Literal`] or a typed Rust value. Nothing runs on the hub besides the firmware itself.
//!
//! ## Architecture
//!
//! - **Transport**: [`RawRepl`] speaks the raw REPL over the serial port; [`MockTransport`]
//!   replays canned replies for tests
//! - **Evaluator**: wraps expressions, decodes replies with the [`Literal`] parser
//! - **Call builder**: [`protocol::Call`] renders arguments in Python literal syntax
//! - **Facade**: [`Hub`] and its subsystem proxies mirror the firmware's `hub` module
//! - **Motor pairs**: [`Motor::pair`] binds a remote `MotorPair` to a variable and keeps
//!   calling it by name
//!
//! Requests are serialized: one snippet is in flight per hub at any time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hubrepl::{Hub, PairOutcome, PairRunOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Find the hub by its USB ids and enter the raw REPL
//!     let hub = Hub::connect_first().await?;
//!
//!     println!("Battery: {} mV", hub.battery().voltage().await?);
//!
//!     let left = hub.port().a().motor();
//!     let right = hub.port().b().motor();
//!     if let PairOutcome::Paired(pair) = left.pair(&right).await? {
//!         pair.run_for_time(1000, PairRunOptions {
//!             speed_0: Some(50),
//!             speed_1: Some(-50),
//!             ..PairRunOptions::default()
//!         }).await?;
//!         pair.unpair().await?;
//!     }
//!
//!     hub.close().await?;
//!     Ok(())
//! }
//! ```

/// Error types and handling
pub mod error;
/// Hub connection and top level facade
pub mod hub;
/// Display images and the firmware's icon table
pub mod image;
/// Python literal values and their parser
pub mod literal;
/// Motors, motor pairs and their options
pub mod motor;
/// Ports, devices and GPIO pins
pub mod port;
/// Remote expressions and reply decoding
pub mod protocol;
/// Serial port discovery and the raw REPL transport
pub mod serial;
/// Battery, bluetooth, buttons, display, motion, sound, supervision and os proxies
pub mod subsystems;
/// Transport abstraction and an in-memory mock
pub mod transport;
/// Type definitions and data structures
pub mod types;

// Re-export the main types for convenient usage
pub use error::{HubError, Result};
pub use hub::{Hub, PowerOff};
pub use image::{icons, Image};
pub use literal::{FromLiteral, Literal, LiteralError};
pub use motor::{Motor, MotorDefaults, MotorPair, PairOutcome, PairRunOptions, RunOptions};
pub use port::{Device, Pin, Port, Ports};
pub use serial::{PortScanner, RawRepl};
pub use subsystems::{
    Battery, Bluetooth, Button, Buttons, Display, Motion, Os, ShowOptions, Sound, Supervision,
};
pub use transport::{MockTransport, Transport};
pub use types::{
    BatteryStatus, BusyType, ChargerState, ChargerType, ConnectionParams, DataFormat, DeviceInfo,
    Face, Gesture, MotorEvent, PortEvent, PortId, PortMode, StopAction, TimeoutConfig, Waveform,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// USB vendor id of the hub (LEGO)
pub const USB_VID: u16 = 0x0694;

/// USB product id of the hub running its MicroPython firmware
pub const USB_PID: u16 = 0x0010;
