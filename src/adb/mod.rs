// ADB transport: drives a device of the local ADB server through adb_client.

pub mod channel;
pub mod error;

pub use channel::{AdbChannel, Device};
pub use error::{AdbError, AdbResult};
