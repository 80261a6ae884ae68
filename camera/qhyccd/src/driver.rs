//! The function table a [crate::Session] drives.
//!
//! [Driver] has one method per native entry point. Methods return the raw
//! [Status] and write outputs through `&mut` arguments so that the session
//! checks every status where the call is made.

use std::{ffi::CStr, os::raw::c_void, ptr::NonNull};

use qhyccd_sys::{QHYCCD_FW_VERSION_LEN, QHYCCD_ID_LEN};

use crate::{control::Control, status::Status};

/// An open camera as returned by `OpenQHYCCD`. Never null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(NonNull<c_void>);

impl DeviceHandle {
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(DeviceHandle)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl From<NonNull<c_void>> for DeviceHandle {
    fn from(ptr: NonNull<c_void>) -> Self {
        DeviceHandle(ptr)
    }
}

/// Result of `GetQHYCCDChipInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChipInfo {
    /// Physical sensor size `[width, height]` in mm.
    pub chip_size_mm: [f64; 2],
    /// Maximum raster `[width, height]` in pixels.
    pub image_size: [u32; 2],
    /// Physical pixel size `[width, height]` in µm.
    pub pixel_size_um: [f64; 2],
    pub bpp: u32,
}

/// A rectangle on the sensor, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Area {
    pub start: [u32; 2],
    pub size: [u32; 2],
}

/// Frame geometry reported by `GetQHYCCDSingleFrame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub channels: u32,
}

pub trait Driver {
    fn set_log_level(&self, level: u8) -> Status;
    fn init_resource(&self) -> Status;
    fn release_resource(&self) -> Status;
    /// On success the status value is the number of attached cameras.
    fn scan(&self) -> Status;
    fn camera_id(&self, index: u32, id: &mut [u8; QHYCCD_ID_LEN]) -> Status;
    fn open(&self, id: &CStr) -> Option<DeviceHandle>;
    fn close(&self, handle: DeviceHandle) -> Status;
    fn init_camera(&self, handle: DeviceHandle) -> Status;
    /// Success means the control is available.
    fn is_control_available(&self, handle: DeviceHandle, control: Control) -> Status;
    fn get_param(&self, handle: DeviceHandle, control: Control) -> f64;
    fn set_param(&self, handle: DeviceHandle, control: Control, value: f64) -> Status;
    fn set_bits_mode(&self, handle: DeviceHandle, bits: u32) -> Status;
    fn set_stream_mode(&self, handle: DeviceHandle, mode: u8) -> Status;
    fn set_bin_mode(&self, handle: DeviceHandle, wbin: u32, hbin: u32) -> Status;
    fn set_resolution(&self, handle: DeviceHandle, area: Area) -> Status;
    /// Bytes needed to receive one frame at the current settings.
    fn mem_length(&self, handle: DeviceHandle) -> u32;
    /// Blocks for the exposure.
    fn exp_single_frame(&self, handle: DeviceHandle) -> Status;
    fn get_single_frame(
        &self,
        handle: DeviceHandle,
        info: &mut FrameInfo,
        data: &mut [u8],
    ) -> Status;
    fn chip_info(&self, handle: DeviceHandle, info: &mut ChipInfo) -> Status;
    fn overscan_area(&self, handle: DeviceHandle, area: &mut Area) -> Status;
    fn effective_area(&self, handle: DeviceHandle, area: &mut Area) -> Status;
    /// Year (two digits), month, day and sub-day build number.
    fn sdk_version(&self, version: &mut [u32; 4]) -> Status;
    fn firmware_version(
        &self,
        handle: DeviceHandle,
        buf: &mut [u8; QHYCCD_FW_VERSION_LEN],
    ) -> Status;
    fn cancel_exposing_and_readout(&self, handle: DeviceHandle) -> Status;
}
