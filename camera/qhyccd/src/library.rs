use std::{ffi::CStr, os::raw::c_char, path::Path};

use qhyccd_sys::{QHYCCD_FW_VERSION_LEN, QHYCCD_ID_LEN, QhyCcdLib};

use crate::{
    Error, Result,
    control::Control,
    driver::{Area, ChipInfo, DeviceHandle, Driver, FrameInfo},
    status::Status,
};

macro_rules! qhy_call_raw {
    ($expr: expr_2021) => {{
        tracing::debug!("calling: {} {}:{}", stringify!($expr), file!(), line!());
        unsafe { $expr }
    }};
}

macro_rules! qhy_call {
    ($expr: expr_2021) => {{
        let status = qhy_call_raw!($expr);
        tracing::debug!("  status: 0x{:08X}", status);
        Status(status)
    }};
}

/// The vendor SDK, loaded at runtime.
pub struct QhyCcdLibrary {
    lib: QhyCcdLib,
}

impl QhyCcdLibrary {
    /// Load from `QHYCCD_LIBRARY` or the platform default name.
    pub fn new() -> Result<Self> {
        Self::from_path(qhyccd_sys::default_library_path())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("loading {}", path.display());
        match unsafe { QhyCcdLib::new(path) } {
            Ok(lib) => Ok(Self { lib }),
            Err(source) => Err(Error::LibLoading {
                source,
                path: path.to_path_buf(),
            }),
        }
    }
}

impl Driver for QhyCcdLibrary {
    fn set_log_level(&self, level: u8) -> Status {
        qhy_call!(self.lib.SetQHYCCDLogLevel(level))
    }

    fn init_resource(&self) -> Status {
        qhy_call!(self.lib.InitQHYCCDResource())
    }

    fn release_resource(&self) -> Status {
        qhy_call!(self.lib.ReleaseQHYCCDResource())
    }

    fn scan(&self) -> Status {
        qhy_call!(self.lib.ScanQHYCCD())
    }

    fn camera_id(&self, index: u32, id: &mut [u8; QHYCCD_ID_LEN]) -> Status {
        qhy_call!(self.lib.GetQHYCCDId(index, id.as_mut_ptr() as *mut c_char))
    }

    fn open(&self, id: &CStr) -> Option<DeviceHandle> {
        // The SDK takes a mutable pointer but does not write through it.
        let ptr = qhy_call_raw!(self.lib.OpenQHYCCD(id.as_ptr() as *mut c_char));
        DeviceHandle::new(ptr)
    }

    fn close(&self, handle: DeviceHandle) -> Status {
        qhy_call!(self.lib.CloseQHYCCD(handle.as_ptr()))
    }

    fn init_camera(&self, handle: DeviceHandle) -> Status {
        qhy_call!(self.lib.InitQHYCCD(handle.as_ptr()))
    }

    fn is_control_available(&self, handle: DeviceHandle, control: Control) -> Status {
        qhy_call!(self.lib.IsQHYCCDControlAvailable(handle.as_ptr(), control.code()))
    }

    fn get_param(&self, handle: DeviceHandle, control: Control) -> f64 {
        let value = qhy_call_raw!(self.lib.GetQHYCCDParam(handle.as_ptr(), control.code()));
        tracing::debug!("  value: {}", value);
        value
    }

    fn set_param(&self, handle: DeviceHandle, control: Control, value: f64) -> Status {
        qhy_call!(self.lib.SetQHYCCDParam(handle.as_ptr(), control.code(), value))
    }

    fn set_bits_mode(&self, handle: DeviceHandle, bits: u32) -> Status {
        qhy_call!(self.lib.SetQHYCCDBitsMode(handle.as_ptr(), bits))
    }

    fn set_stream_mode(&self, handle: DeviceHandle, mode: u8) -> Status {
        qhy_call!(self.lib.SetQHYCCDStreamMode(handle.as_ptr(), mode))
    }

    fn set_bin_mode(&self, handle: DeviceHandle, wbin: u32, hbin: u32) -> Status {
        qhy_call!(self.lib.SetQHYCCDBinMode(handle.as_ptr(), wbin, hbin))
    }

    fn set_resolution(&self, handle: DeviceHandle, area: Area) -> Status {
        qhy_call!(self.lib.SetQHYCCDResolution(
            handle.as_ptr(),
            area.start[0],
            area.start[1],
            area.size[0],
            area.size[1],
        ))
    }

    fn mem_length(&self, handle: DeviceHandle) -> u32 {
        qhy_call_raw!(self.lib.GetQHYCCDMemLength(handle.as_ptr()))
    }

    fn exp_single_frame(&self, handle: DeviceHandle) -> Status {
        qhy_call!(self.lib.ExpQHYCCDSingleFrame(handle.as_ptr()))
    }

    fn get_single_frame(
        &self,
        handle: DeviceHandle,
        info: &mut FrameInfo,
        data: &mut [u8],
    ) -> Status {
        let required = self.mem_length(handle) as usize;
        if data.len() < required {
            tracing::error!(
                "frame buffer holds {} bytes, driver needs {}",
                data.len(),
                required
            );
            return Status(qhyccd_sys::QHYCCD_ERROR);
        }
        qhy_call!(self.lib.GetQHYCCDSingleFrame(
            handle.as_ptr(),
            &mut info.width,
            &mut info.height,
            &mut info.bpp,
            &mut info.channels,
            data.as_mut_ptr(),
        ))
    }

    fn chip_info(&self, handle: DeviceHandle, info: &mut ChipInfo) -> Status {
        let [chipw, chiph] = &mut info.chip_size_mm;
        let [imagew, imageh] = &mut info.image_size;
        let [pixelw, pixelh] = &mut info.pixel_size_um;
        qhy_call!(self.lib.GetQHYCCDChipInfo(
            handle.as_ptr(),
            chipw,
            chiph,
            imagew,
            imageh,
            pixelw,
            pixelh,
            &mut info.bpp,
        ))
    }

    fn overscan_area(&self, handle: DeviceHandle, area: &mut Area) -> Status {
        let [startx, starty] = &mut area.start;
        let [sizex, sizey] = &mut area.size;
        qhy_call!(self
            .lib
            .GetQHYCCDOverScanArea(handle.as_ptr(), startx, starty, sizex, sizey))
    }

    fn effective_area(&self, handle: DeviceHandle, area: &mut Area) -> Status {
        let [startx, starty] = &mut area.start;
        let [sizex, sizey] = &mut area.size;
        qhy_call!(self
            .lib
            .GetQHYCCDEffectiveArea(handle.as_ptr(), startx, starty, sizex, sizey))
    }

    fn sdk_version(&self, version: &mut [u32; 4]) -> Status {
        let [year, month, day, subday] = version;
        qhy_call!(self.lib.GetQHYCCDSDKVersion(year, month, day, subday))
    }

    fn firmware_version(
        &self,
        handle: DeviceHandle,
        buf: &mut [u8; QHYCCD_FW_VERSION_LEN],
    ) -> Status {
        qhy_call!(self.lib.GetQHYCCDFWVersion(handle.as_ptr(), buf.as_mut_ptr()))
    }

    fn cancel_exposing_and_readout(&self, handle: DeviceHandle) -> Status {
        qhy_call!(self.lib.CancelQHYCCDExposingAndReadout(handle.as_ptr()))
    }
}
