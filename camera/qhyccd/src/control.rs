//! Control parameters understood by the driver's generic get/set and
//! capability calls.

use crate::{Error, Result};

macro_rules! controls {
    ($( $variant:ident = $code:literal, $name:literal, $desc:literal; )*) => {
        /// A control parameter code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Control {
            $( $variant, )*
        }

        impl Control {
            pub const ALL: &'static [Control] = &[$( Control::$variant, )*];

            pub const fn code(self) -> u32 {
                match self {
                    $( Control::$variant => $code, )*
                }
            }

            /// The driver's symbolic name, e.g. `CONTROL_GAIN`.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Control::$variant => $name, )*
                }
            }

            pub const fn description(self) -> &'static str {
                match self {
                    $( Control::$variant => $desc, )*
                }
            }

            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $( $code => Some(Control::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

controls! {
    Brightness = 0, "CONTROL_BRIGHTNESS", "Image brightness";
    Contrast = 1, "CONTROL_CONTRAST", "Image contrast";
    WhiteBalanceRed = 2, "CONTROL_WBR", "Red of white balance";
    WhiteBalanceBlue = 3, "CONTROL_WBB", "Blue of white balance";
    WhiteBalanceGreen = 4, "CONTROL_WBG", "Green of white balance";
    Gamma = 5, "CONTROL_GAMMA", "Screen gamma";
    Gain = 6, "CONTROL_GAIN", "Detector gain";
    Offset = 7, "CONTROL_OFFSET", "Detector offset";
    Exposure = 8, "CONTROL_EXPOSURE", "Exposure time (us)";
    Speed = 9, "CONTROL_SPEED", "Transfer speed";
    TransferBit = 10, "CONTROL_TRANSFERBIT", "Image bit depth";
    Channels = 11, "CONTROL_CHANNELS", "Number of image channels";
    UsbTraffic = 12, "CONTROL_USBTRAFFIC", "USB traffic parameter";
    RowNoiseReduction = 13, "CONTROL_ROWNOISERE", "Row noise reduction";
    CurrentTemperature = 14, "CONTROL_CURTEMP", "Current detector temperature";
    CurrentPwm = 15, "CONTROL_CURPWM", "Current cooling power";
    ManualPwm = 16, "CONTROL_MANULPWM", "Cooling power adjustment";
    CfwPort = 17, "CONTROL_CFWPORT", "Color filter wheel port";
    Cooler = 18, "CONTROL_COOLER", "Cooler";
    St4Port = 19, "CONTROL_ST4PORT", "ST4 port";
    Color = 20, "CAM_COLOR", "Color feature";
    Bin1x1Mode = 21, "CAM_BIN1X1MODE", "1x1 binning mode";
    Bin2x2Mode = 22, "CAM_BIN2X2MODE", "2x2 binning mode";
    Bin3x3Mode = 23, "CAM_BIN3X3MODE", "3x3 binning mode";
    Bin4x4Mode = 24, "CAM_BIN4X4MODE", "4x4 binning mode";
    MechanicalShutter = 25, "CAM_MECHANICALSHUTTER", "Mechanical shutter";
    TriggerInterface = 26, "CAM_TRIGER_INTERFACE", "Trigger interface";
    TecOverProtect = 27, "CAM_TECOVERPROTECT_INTERFACE", "TEC overprotection";
    SignalClamp = 28, "CAM_SINGNALCLAMP_INTERFACE", "Signal clamp";
    FineTone = 29, "CAM_FINETONE_INTERFACE", "Fine tone";
    ShutterMotorHeating = 30, "CAM_SHUTTERMOTORHEATING_INTERFACE", "Shutter motor heating";
    CalibrateFpn = 31, "CAM_CALIBRATEFPN_INTERFACE", "Calibrated frame";
    ChipTemperatureSensor = 32, "CAM_CHIPTEMPERATURESENSOR_INTERFACE", "Chip temperature sensor";
    UsbReadoutSlowest = 33, "CAM_USBREADOUTSLOWEST_INTERFACE", "USB readout slowest";
    Bits8 = 34, "CAM_8BITS", "8-bit depth";
    Bits16 = 35, "CAM_16BITS", "16-bit depth";
    Gps = 36, "CAM_GPS", "GPS";
    IgnoreOverscan = 37, "CAM_IGNOREOVERSCAN_INTERFACE", "Ignore overscan area";
    AutoWhiteBalance = 38, "QHYCCD_3A_AUTOBALANCE", "Auto white balance";
    AutoExposure = 39, "QHYCCD_3A_AUTOEXPOSURE", "Auto exposure time";
    AutoFocus = 40, "QHYCCD_3A_AUTOFOCUS", "Autofocus";
    Ampv = 41, "CONTROL_AMPV", "Detector ampv";
    Vcam = 42, "CONTROL_VCAM", "Virtual Camera switch";
    ViewMode = 43, "CAM_VIEW_MODE", "View mode";
    CfwSlotsNum = 44, "CONTROL_CFWSLOTSNUM", "CFW slots number";
    IsExposingDone = 45, "IS_EXPOSING_DONE", "Exposure complete flag";
    ScreenStretchB = 46, "ScreenStretchB", "Screen stretch B";
    ScreenStretchW = 47, "ScreenStretchW", "Screen stretch W";
    Ddr = 48, "CONTROL_DDR", "DDR";
    LightPerformanceMode = 49, "CAM_LIGHT_PERFORMANCE_MODE", "Light performance mode";
    Qhy5iiGuideMode = 50, "CAM_QHY5II_GUIDE_MODE", "QHY5II guide mode";
    DdrBufferCapacity = 51, "DDR_BUFFER_CAPACITY", "DDR buffer capacity";
    DdrBufferReadThreshold = 52, "DDR_BUFFER_READ_THRESHOLD", "DDR read threshold";
    DefaultGain = 53, "DefaultGain", "Default detector gain";
    DefaultOffset = 54, "DefaultOffset", "Default detector offset";
    OutputDataActualBits = 55, "OutputDataActualBits", "Actual number of bits in output data";
    OutputDataAlignment = 56, "OutputDataAlignment", "Output data alignment";
    SingleFrameMode = 57, "CAM_SINGLEFRAMEMODE", "Single frame mode";
    LiveVideoMode = 58, "CAM_LIVEVIDEOMODE", "Live video mode";
    IsColor = 59, "CAM_IS_COLOR", "Color mode";
    HardwareFrameCounter = 60, "hasHardwareFrameCounter", "Hardware frame counter";
    MaxIdError = 61, "CONTROL_MAX_ID_Error", "Max Error ID";
    Humidity = 62, "CAM_HUMIDITY", "Humidity sensor";
    Pressure = 63, "CAM_PRESSURE", "Pressure sensor";
    VacuumPump = 64, "CONTROL_VACUUM_PUMP", "Vacuum pump";
    SensorChamberCyclePump = 65, "CONTROL_SensorChamberCycle_PUMP", "Chamber Cycle pump sensor";
}

impl Control {
    /// The capability advertising symmetric binning by `factor`.
    pub fn bin_mode(factor: u32) -> Option<Self> {
        match factor {
            1 => Some(Control::Bin1x1Mode),
            2 => Some(Control::Bin2x2Mode),
            3 => Some(Control::Bin3x3Mode),
            4 => Some(Control::Bin4x4Mode),
            _ => None,
        }
    }
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Control {
    type Err = Error;

    /// Parse a symbolic name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self> {
        Control::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownControl(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_are_dense() {
        assert_eq!(Control::ALL.len(), 66);
        for (i, control) in Control::ALL.iter().enumerate() {
            assert_eq!(control.code() as usize, i);
            assert_eq!(Control::from_code(control.code()), Some(*control));
        }
        assert_eq!(Control::from_code(66), None);
    }

    #[test]
    fn parse_by_name() {
        assert_eq!("CONTROL_GAIN".parse::<Control>().unwrap(), Control::Gain);
        assert_eq!(
            "control_usbtraffic".parse::<Control>().unwrap(),
            Control::UsbTraffic
        );
        assert_eq!(
            "hasHardwareFrameCounter".parse::<Control>().unwrap(),
            Control::HardwareFrameCounter
        );
        match "CONTROL_NOPE".parse::<Control>() {
            Err(Error::UnknownControl(name)) => assert_eq!(name, "CONTROL_NOPE"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn names_are_unique() {
        let names: std::collections::BTreeSet<_> =
            Control::ALL.iter().map(|c| c.name().to_ascii_lowercase()).collect();
        assert_eq!(names.len(), Control::ALL.len());
    }
}
