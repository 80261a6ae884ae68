use qhyccd_sys::{QHYCCD_ERROR_MIN, QHYCCD_SUCCESS};

macro_rules! error_codes {
    ($( $variant:ident = $code:literal, $name:literal, $desc:literal; )*) => {
        /// Status values the driver documents.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorCode {
            $( $variant, )*
        }

        impl ErrorCode {
            pub const ALL: &'static [ErrorCode] = &[$( ErrorCode::$variant, )*];

            pub const fn code(self) -> u32 {
                match self {
                    $( ErrorCode::$variant => $code, )*
                }
            }

            /// The driver's symbolic name, e.g. `QHYCCD_ERROR_NO_DEVICE`.
            pub const fn name(self) -> &'static str {
                match self {
                    $( ErrorCode::$variant => $name, )*
                }
            }

            pub const fn description(self) -> &'static str {
                match self {
                    $( ErrorCode::$variant => $desc, )*
                }
            }

            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $( $code => Some(ErrorCode::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

error_codes! {
    Success = 0x0000_0000, "QHYCCD_SUCCESS", "Camera works well";
    Error = 0xFFFF_FFFF, "QHYCCD_ERROR", "Error";
    NoDevice = 0xFFFF_FFFE, "QHYCCD_ERROR_NO_DEVICE", "No camera connected";
    Unsupported = 0xFFFF_FFFD, "QHYCCD_ERROR_UNSUPPORTED", "Unsupported function";
    SetParams = 0xFFFF_FFFC, "QHYCCD_ERROR_SETPARAMS", "Invalid parameter (set)";
    GetParams = 0xFFFF_FFFB, "QHYCCD_ERROR_GETPARAMS", "Invalid parameter (get)";
    Exposing = 0xFFFF_FFFA, "QHYCCD_ERROR_EXPOSING", "Exposure ongoing";
    ExpFailed = 0xFFFF_FFF9, "QHYCCD_ERROR_EXPFAILED", "Exposure failed";
    GettingData = 0xFFFF_FFF8, "QHYCCD_ERROR_GETTINGDATA", "Another instance is transferring data";
    GettingFailed = 0xFFFF_FFF7, "QHYCCD_ERROR_GETTINGFAILED", "Data transfer failure";
    InitCamera = 0xFFFF_FFF6, "QHYCCD_ERROR_INITCAMERA", "Camera initialization failure";
    ReleaseResource = 0xFFFF_FFF5, "QHYCCD_ERROR_RELEASERESOURCE", "Resource release failure";
    InitResource = 0xFFFF_FFF4, "QHYCCD_ERROR_INITRESOURCE", "Resource initialization failure";
    NoMatch = 0xFFFF_FFF3, "QHYCCD_ERROR_NO_MATCH", "No camera matched";
    OpenCam = 0xFFFF_FFF2, "QHYCCD_ERROR_ERROR_OPENCAM", "Camera opening failure";
    InitClass = 0xFFFF_FFF1, "QHYCCD_ERROR_INITCLASS", "Cam class initialization failure";
    SetResolution = 0xFFFF_FFF0, "QHYCCD_ERROR_SETRESOLUTION", "Invalid resolution";
    UsbTraffic = 0xFFFF_FFEF, "QHYCCD_ERROR_USBTRAFFIC", "Invalid USB traffic setting";
    UsbSpeed = 0xFFFF_FFEE, "QHYCCD_ERROR_USBSPEED", "Invalid USB speed setting";
    SetExpose = 0xFFFF_FFED, "QHYCCD_ERROR_SETEXPOSE", "Invalid exposure time";
    SetGain = 0xFFFF_FFEC, "QHYCCD_ERROR_SETGAIN", "Invalid detector gain";
    SetRed = 0xFFFF_FFEB, "QHYCCD_ERROR_SETRED", "Invalid red color balance";
    SetBlue = 0xFFFF_FFEA, "QHYCCD_ERROR_SETBLUE", "Invalid blue color balance";
    EvtCmos = 0xFFFF_FFE9, "QHYCCD_ERROR_EVTCMOS", "CMOS EVT failure";
    EvtUsb = 0xFFFF_FFE8, "QHYCCD_ERROR_EVTUSB", "USB EVT failure";
    Unknown = 0xFFFF_FFE7, "QHYCCD_ERROR_UNKNOWN", "Unknown";
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure status reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverError {
    pub code: u32,
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:08X})", self.description(), self.code)
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }

    pub fn description(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.description(),
            None => "unknown driver error",
        }
    }
}

impl From<ErrorCode> for DriverError {
    fn from(kind: ErrorCode) -> Self {
        DriverError { code: kind.code() }
    }
}

/// Raw status returned by a driver entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Status(pub u32);

impl Status {
    pub const SUCCESS: Status = Status(QHYCCD_SUCCESS);

    pub fn is_failure(self) -> bool {
        self.0 >= QHYCCD_ERROR_MIN
    }

    /// Return the status value unless it lies in the failure range.
    ///
    /// Values below the range are not all zero: `ScanQHYCCD` returns the
    /// number of cameras, and some calls return informational codes.
    pub fn check(self) -> std::result::Result<u32, DriverError> {
        if self.is_failure() {
            Err(DriverError { code: self.0 })
        } else {
            Ok(self.0)
        }
    }
}

impl From<ErrorCode> for Status {
    fn from(kind: ErrorCode) -> Self {
        Status(kind.code())
    }
}
