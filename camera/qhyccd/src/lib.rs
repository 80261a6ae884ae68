//! Single-frame control of QHYCCD scientific cameras.
//!
//! A [Session] opens one camera through a [Driver], applies a
//! [SessionConfig] and acquires frames into an [ImageBuffer]. The vendor
//! SDK is reached through [QhyCcdLibrary]; [SimulatedDriver] stands in for
//! it without hardware.

pub mod config;
pub mod control;
pub mod driver;
pub mod image;
mod library;
mod session;
pub mod sim;
pub mod status;
pub mod version;

pub use config::SessionConfig;
pub use control::Control;
pub use driver::{Area, ChipInfo, DeviceHandle, Driver, FrameInfo};
pub use image::{HostTimingInfo, ImageBuffer};
pub use library::QhyCcdLibrary;
pub use session::{Session, StreamMode};
pub use sim::SimulatedDriver;
pub use status::{DriverError, ErrorCode, Status};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("driver resource: {0}")]
    Resource(#[source] DriverError),
    #[error("{}", ErrorCode::NoDevice.description())]
    NoDevice,
    #[error("{}: index {index} of {count}", ErrorCode::NoMatch.description())]
    NoMatch { index: u32, count: u32 },
    #[error("{}: {id}", ErrorCode::OpenCam.description())]
    Open { id: String },
    #[error("{desc}: {0}", desc = ErrorCode::Unsupported.description())]
    Unsupported(Control),
    #[error("setting {setting}: {source}")]
    Config {
        setting: &'static str,
        source: DriverError,
    },
    #[error("exposure: {0}")]
    Exposure(#[source] DriverError),
    #[error("frame transfer: {0}")]
    Transfer(#[source] DriverError),
    #[error("{0}")]
    State(&'static str),
    #[error("{context}: {source}")]
    Driver {
        context: &'static str,
        source: DriverError,
    },
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: String },
    #[error("unknown control {0:?}")]
    UnknownControl(String),
    #[error("Loading library at {path}")]
    LibLoading {
        source: libloading::Error,
        path: std::path::PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
