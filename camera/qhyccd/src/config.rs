//! Session configuration, usually read from a TOML file.

use serde::{Deserialize, Serialize};

/// The configuration file error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
    #[error("TOML deserialization error: {source}")]
    TomlDeError {
        #[from]
        source: toml::de::Error,
    },
    #[error("TOML serialization error: {source}")]
    TomlSerError {
        #[from]
        source: toml::ser::Error,
    },
}

type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_GAIN: f64 = 100.0;
pub const DEFAULT_OFFSET: f64 = 100.0;
/// The default exposure time, in seconds.
pub const DEFAULT_EXPOSURE_TIME: f64 = 0.1;
pub const DEFAULT_BIT_DEPTH: u32 = 16;

fn default_usb_traffic() -> Option<u32> {
    Some(0)
}

fn default_gain() -> Option<f64> {
    Some(DEFAULT_GAIN)
}

fn default_offset() -> Option<f64> {
    Some(DEFAULT_OFFSET)
}

fn default_exposure_time() -> Option<f64> {
    Some(DEFAULT_EXPOSURE_TIME)
}

fn default_region_size() -> Option<[u32; 2]> {
    Some([0, 0])
}

fn default_bin_size() -> Option<[u32; 2]> {
    Some([1, 1])
}

fn default_bit_depth() -> Option<u32> {
    Some(DEFAULT_BIT_DEPTH)
}

/// `None` is written as the string `"unset"`, as TOML has no null.
mod unset {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

    pub const WORD: &str = "unset";

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_str(WORD),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr<T> {
        Value(T),
        Word(String),
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        match Repr::<T>::deserialize(deserializer)? {
            Repr::Value(value) => Ok(Some(value)),
            Repr::Word(word) if word == WORD => Ok(None),
            Repr::Word(word) => Err(D::Error::custom(format!(
                "expected a value or \"{WORD}\", found \"{word}\""
            ))),
        }
    }
}

/// Which camera to open and the values applied to it by
/// [crate::Session::open].
///
/// A `None` value, written `"unset"` in a file, leaves the device setting
/// untouched. A field missing from a file takes its default. A
/// `region_size` of `[0, 0]` selects the full sensor; `None` leaves the
/// region unset, so no image buffer is allocated until
/// [crate::Session::set_region] is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Index into the cameras found by the scan.
    #[serde(default)]
    pub camera_index: u32,
    /// Verbosity passed to `SetQHYCCDLogLevel`.
    #[serde(default)]
    pub driver_log_level: u8,
    #[serde(default = "default_usb_traffic", with = "unset")]
    pub usb_traffic: Option<u32>,
    #[serde(default = "default_gain", with = "unset")]
    pub gain: Option<f64>,
    #[serde(default = "default_offset", with = "unset")]
    pub offset: Option<f64>,
    /// Seconds.
    #[serde(default = "default_exposure_time", with = "unset")]
    pub exposure_time: Option<f64>,
    #[serde(default)]
    pub region_start: [u32; 2],
    #[serde(default = "default_region_size", with = "unset")]
    pub region_size: Option<[u32; 2]>,
    #[serde(default = "default_bin_size", with = "unset")]
    pub bin_size: Option<[u32; 2]>,
    #[serde(default = "default_bit_depth", with = "unset")]
    pub bit_depth: Option<u32>,
    /// Cooler set point in °C.
    #[serde(default, with = "unset")]
    pub target_temperature: Option<f64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            driver_log_level: 0,
            usb_traffic: default_usb_traffic(),
            gain: default_gain(),
            offset: default_offset(),
            exposure_time: default_exposure_time(),
            region_start: [0, 0],
            region_size: default_region_size(),
            bin_size: default_bin_size(),
            bit_depth: default_bit_depth(),
            target_temperature: None,
        }
    }
}

impl SessionConfig {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

pub fn parse_config_file<P: AsRef<std::path::Path>>(fname: P) -> Result<SessionConfig> {
    use std::io::Read;

    let mut file = std::fs::File::open(fname.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let cfg = toml::from_str(&contents)?;
    Ok(cfg)
}
