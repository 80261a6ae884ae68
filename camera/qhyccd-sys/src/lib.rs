//! Raw bindings to the QHYCCD camera SDK (`libqhyccd`).
//!
//! The SDK is loaded at runtime with [libloading] so that nothing links
//! against the vendor library at build time. Every entry point returns the
//! SDK's unsigned 32-bit status unless noted otherwise.
#![allow(non_snake_case, non_camel_case_types)]

use std::os::raw::{c_char, c_void};

/// Opaque camera handle returned by `OpenQHYCCD`.
pub type qhyccd_handle = c_void;

/// Control parameter code passed to the param and capability functions.
pub type CONTROL_ID = u32;

pub const QHYCCD_SUCCESS: u32 = 0x0000_0000;
/// Generic failure; also returned as a `double` by `GetQHYCCDParam`.
pub const QHYCCD_ERROR: u32 = 0xFFFF_FFFF;
/// Status values at or above this are failure sentinels.
pub const QHYCCD_ERROR_MIN: u32 = 0xFFFF_0000;

pub const QHYCCD_STREAM_SINGLE: u8 = 0x00;
pub const QHYCCD_STREAM_LIVE: u8 = 0x01;

/// Size of the buffer handed to `GetQHYCCDId`.
pub const QHYCCD_ID_LEN: usize = 64;
/// Size of the buffer handed to `GetQHYCCDFWVersion`.
pub const QHYCCD_FW_VERSION_LEN: usize = 32;

#[cfg(target_os = "linux")]
pub const DEFAULT_LIBRARY_NAME: &str = "libqhyccd.so";
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAME: &str = "libqhyccd.dylib";
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAME: &str = "qhyccd.dll";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_LIBRARY_NAME: &str = "libqhyccd.so";

/// Environment variable overriding [DEFAULT_LIBRARY_NAME].
pub const LIBRARY_ENV_VAR: &str = "QHYCCD_LIBRARY";

macro_rules! function_table {
    ($( fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty; )*) => {
        /// Function pointers resolved from a loaded `libqhyccd`.
        ///
        /// The library stays loaded for as long as this value lives.
        pub struct QhyCcdLib {
            _lib: libloading::Library,
            $( $name: unsafe extern "C" fn($($ty),*) -> $ret, )*
        }

        impl QhyCcdLib {
            /// Load the shared library at `path` and resolve every symbol.
            ///
            /// # Safety
            ///
            /// Loading a library runs its initialization routines. `path`
            /// must name a genuine QHYCCD SDK build whose exported
            /// functions have the signatures declared here.
            pub unsafe fn new<P: AsRef<std::ffi::OsStr>>(
                path: P,
            ) -> Result<Self, libloading::Error> {
                let lib = unsafe { libloading::Library::new(path) }?;
                $(
                    let $name = unsafe {
                        *lib.get::<unsafe extern "C" fn($($ty),*) -> $ret>(
                            concat!(stringify!($name), "\0").as_bytes(),
                        )?
                    };
                )*
                Ok(Self { _lib: lib, $($name,)* })
            }

            $(
                /// # Safety
                ///
                /// Pointer arguments must be valid for the access the SDK
                /// documents for this function.
                #[inline]
                pub unsafe fn $name(&self, $($arg: $ty),*) -> $ret {
                    unsafe { (self.$name)($($arg),*) }
                }
            )*
        }
    };
}

function_table! {
    fn SetQHYCCDLogLevel(level: u8) -> u32;
    fn InitQHYCCDResource() -> u32;
    fn ReleaseQHYCCDResource() -> u32;
    fn ScanQHYCCD() -> u32;
    fn GetQHYCCDId(index: u32, id: *mut c_char) -> u32;
    fn OpenQHYCCD(id: *mut c_char) -> *mut qhyccd_handle;
    fn CloseQHYCCD(handle: *mut qhyccd_handle) -> u32;
    fn InitQHYCCD(handle: *mut qhyccd_handle) -> u32;
    fn IsQHYCCDControlAvailable(handle: *mut qhyccd_handle, control: CONTROL_ID) -> u32;
    fn GetQHYCCDParam(handle: *mut qhyccd_handle, control: CONTROL_ID) -> f64;
    fn SetQHYCCDParam(handle: *mut qhyccd_handle, control: CONTROL_ID, value: f64) -> u32;
    fn SetQHYCCDBitsMode(handle: *mut qhyccd_handle, bits: u32) -> u32;
    fn SetQHYCCDStreamMode(handle: *mut qhyccd_handle, mode: u8) -> u32;
    fn SetQHYCCDBinMode(handle: *mut qhyccd_handle, wbin: u32, hbin: u32) -> u32;
    fn SetQHYCCDResolution(
        handle: *mut qhyccd_handle,
        x: u32,
        y: u32,
        xsize: u32,
        ysize: u32,
    ) -> u32;
    fn GetQHYCCDMemLength(handle: *mut qhyccd_handle) -> u32;
    fn ExpQHYCCDSingleFrame(handle: *mut qhyccd_handle) -> u32;
    fn GetQHYCCDSingleFrame(
        handle: *mut qhyccd_handle,
        w: *mut u32,
        h: *mut u32,
        bpp: *mut u32,
        channels: *mut u32,
        imgdata: *mut u8,
    ) -> u32;
    fn GetQHYCCDChipInfo(
        handle: *mut qhyccd_handle,
        chipw: *mut f64,
        chiph: *mut f64,
        imagew: *mut u32,
        imageh: *mut u32,
        pixelw: *mut f64,
        pixelh: *mut f64,
        bpp: *mut u32,
    ) -> u32;
    fn GetQHYCCDOverScanArea(
        handle: *mut qhyccd_handle,
        startx: *mut u32,
        starty: *mut u32,
        sizex: *mut u32,
        sizey: *mut u32,
    ) -> u32;
    fn GetQHYCCDEffectiveArea(
        handle: *mut qhyccd_handle,
        startx: *mut u32,
        starty: *mut u32,
        sizex: *mut u32,
        sizey: *mut u32,
    ) -> u32;
    fn GetQHYCCDSDKVersion(year: *mut u32, month: *mut u32, day: *mut u32, subday: *mut u32) -> u32;
    fn GetQHYCCDFWVersion(handle: *mut qhyccd_handle, buf: *mut u8) -> u32;
    fn CancelQHYCCDExposingAndReadout(handle: *mut qhyccd_handle) -> u32;
}

/// Resolve the library location from [LIBRARY_ENV_VAR] or the platform
/// default.
pub fn default_library_path() -> std::path::PathBuf {
    match std::env::var_os(LIBRARY_ENV_VAR) {
        Some(path) => std::path::PathBuf::from(path),
        None => std::path::PathBuf::from(DEFAULT_LIBRARY_NAME),
    }
}
