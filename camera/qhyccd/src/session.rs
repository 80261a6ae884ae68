use std::ffi::CStr;

use chrono::Utc;
use qhyccd_sys::{
    QHYCCD_ERROR, QHYCCD_FW_VERSION_LEN, QHYCCD_ID_LEN, QHYCCD_STREAM_LIVE, QHYCCD_STREAM_SINGLE,
};

use crate::{
    Error, Result, SessionConfig,
    control::Control,
    driver::{Area, ChipInfo, DeviceHandle, Driver, FrameInfo},
    image::{HostTimingInfo, ImageBuffer},
    status::DriverError,
    version::{decode_firmware_version, format_sdk_version},
};

/// Acquisition mode passed to `SetQHYCCDStreamMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Single,
    Live,
}

impl StreamMode {
    fn code(self) -> u8 {
        match self {
            StreamMode::Single => QHYCCD_STREAM_SINGLE,
            StreamMode::Live => QHYCCD_STREAM_LIVE,
        }
    }

    /// The capability the device must advertise for this mode.
    pub fn control(self) -> Control {
        match self {
            StreamMode::Single => Control::SingleFrameMode,
            StreamMode::Live => Control::LiveVideoMode,
        }
    }
}

/// Last known values, filled on first query and replaced on set.
#[derive(Debug, Default)]
struct ParamCache {
    usb_traffic: Option<u32>,
    gain: Option<f64>,
    offset: Option<f64>,
    exposure_us: Option<u64>,
    bit_depth: Option<u32>,
    bin_size: Option<[u32; 2]>,
    stream_mode: Option<StreamMode>,
    region: Option<Area>,
    chip_info: Option<ChipInfo>,
    overscan: Option<Area>,
    effective: Option<Area>,
    sdk_version: Option<String>,
    firmware_version: Option<String>,
}

impl ParamCache {
    fn invalidate(&mut self, control: Control) {
        match control {
            Control::UsbTraffic => self.usb_traffic = None,
            Control::Gain => self.gain = None,
            Control::Offset => self.offset = None,
            Control::Exposure => self.exposure_us = None,
            Control::TransferBit => self.bit_depth = None,
            _ => {}
        }
    }
}

/// Whole microseconds in `secs`, truncated toward zero.
fn exposure_to_us(secs: f64) -> u64 {
    (secs * 1e6).floor() as u64
}

/// One open camera.
///
/// Created by [Session::open], which runs the driver's initialization
/// sequence. Dropping the session cancels any readout, closes the camera
/// and releases the driver resource; [Session::close] does the same and
/// reports the first failure.
pub struct Session<D: Driver> {
    driver: D,
    resource_initialized: bool,
    camera_count: u32,
    camera_index: u32,
    camera_id: Option<String>,
    handle: Option<DeviceHandle>,
    region_set: bool,
    image: Option<ImageBuffer>,
    frames: usize,
    cache: ParamCache,
}

impl<D: Driver> Session<D> {
    /// Open camera `cfg.camera_index` and apply the values in `cfg`.
    ///
    /// On failure everything acquired so far is released before the error
    /// is returned.
    pub fn open(driver: D, cfg: &SessionConfig) -> Result<Self> {
        let mut session = Session {
            driver,
            resource_initialized: false,
            camera_count: 0,
            camera_index: cfg.camera_index,
            camera_id: None,
            handle: None,
            region_set: false,
            image: None,
            frames: 0,
            cache: ParamCache::default(),
        };
        session.init(cfg)?;
        Ok(session)
    }

    fn init(&mut self, cfg: &SessionConfig) -> Result<()> {
        let _ = self.driver.set_log_level(cfg.driver_log_level);

        match self.sdk_version() {
            Ok(version) => tracing::info!("QHYCCD SDK version {version}"),
            Err(e) => tracing::warn!("could not read SDK version: {e}"),
        }

        self.driver
            .init_resource()
            .check()
            .map_err(Error::Resource)?;
        self.resource_initialized = true;

        let count = self
            .driver
            .scan()
            .check()
            .map_err(|source| Error::Driver {
                context: "ScanQHYCCD",
                source,
            })?;
        self.camera_count = count;
        if count == 0 {
            return Err(Error::NoDevice);
        }
        tracing::debug!("{count} camera(s) found");

        let index = cfg.camera_index;
        if index >= count {
            return Err(Error::NoMatch { index, count });
        }
        let mut id_buf = [0u8; QHYCCD_ID_LEN];
        self.driver
            .camera_id(index, &mut id_buf)
            .check()
            .map_err(|source| Error::Driver {
                context: "GetQHYCCDId",
                source,
            })?;
        let id_cstr = CStr::from_bytes_until_nul(&id_buf).map_err(|_| Error::Open {
            id: String::from_utf8_lossy(&id_buf).into_owned(),
        })?;
        let id = id_cstr.to_string_lossy().into_owned();
        tracing::info!("camera {index}: {id}");

        let handle = self
            .driver
            .open(id_cstr)
            .ok_or_else(|| Error::Open { id: id.clone() })?;
        self.handle = Some(handle);
        self.camera_id = Some(id);

        let firmware = self.firmware_version()?;
        tracing::info!("firmware version {firmware}");

        if !self.has_control(Control::SingleFrameMode)? {
            return Err(Error::Unsupported(Control::SingleFrameMode));
        }
        self.set_stream_mode(StreamMode::Single)?;

        self.driver
            .init_camera(handle)
            .check()
            .map_err(|source| Error::Driver {
                context: "InitQHYCCD",
                source,
            })?;

        let chip = self.chip_info()?;
        let color = self.is_color()?;
        tracing::info!(
            "{} sensor, {}x{} px, {:.2}x{:.2} mm, pixel {:.2}x{:.2} um, {} bit",
            if color { "color" } else { "mono" },
            chip.image_size[0],
            chip.image_size[1],
            chip.chip_size_mm[0],
            chip.chip_size_mm[1],
            chip.pixel_size_um[0],
            chip.pixel_size_um[1],
            chip.bpp,
        );

        if let Some(usb_traffic) = cfg.usb_traffic {
            self.set_usbtraffic(usb_traffic)?;
        }
        if let Some(gain) = cfg.gain {
            self.set_gain(gain)?;
        }
        if let Some(offset) = cfg.offset {
            self.set_offset(offset)?;
        }
        if let Some(exposure_time) = cfg.exposure_time {
            self.set_exptime(exposure_time)?;
        }
        if let Some(target) = cfg.target_temperature {
            self.set_target_temperature(target)?;
        }
        if let Some(size) = cfg.region_size {
            self.set_region(cfg.region_start, size)?;
        }
        if let Some(bin_size) = cfg.bin_size {
            self.set_binsize(bin_size)?;
        }
        if let Some(bit_depth) = cfg.bit_depth {
            self.set_bitdepth(bit_depth)?;
        }
        Ok(())
    }

    pub fn camera_count(&self) -> u32 {
        self.camera_count
    }

    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.camera_id.as_deref()
    }

    fn handle(&self) -> Result<DeviceHandle> {
        self.handle.ok_or(Error::State("camera is not open"))
    }

    /// Ask the driver whether `control` is available. Not cached.
    pub fn has_control(&self, control: Control) -> Result<bool> {
        let handle = self.handle()?;
        let status = self.driver.is_control_available(handle, control);
        Ok(!status.is_failure())
    }

    fn require(&self, control: Control) -> Result<DeviceHandle> {
        if self.has_control(control)? {
            self.handle()
        } else {
            Err(Error::Unsupported(control))
        }
    }

    /// All controls the camera advertises.
    pub fn available_controls(&self) -> Result<Vec<Control>> {
        let mut available = Vec::new();
        for control in Control::ALL {
            if self.has_control(*control)? {
                available.push(*control);
            }
        }
        Ok(available)
    }

    /// Set any control by code.
    pub fn set_control(&mut self, control: Control, value: f64) -> Result<()> {
        let handle = self.require(control)?;
        self.driver
            .set_param(handle, control, value)
            .check()
            .map_err(|source| Error::Config {
                setting: control.name(),
                source,
            })?;
        self.cache.invalidate(control);
        tracing::debug!("{control} = {value}");
        Ok(())
    }

    /// Read any control by code from the device. Not cached.
    pub fn query_control(&self, control: Control) -> Result<f64> {
        let handle = self.require(control)?;
        let value = self.driver.get_param(handle, control);
        if value == QHYCCD_ERROR as f64 {
            return Err(Error::Driver {
                context: control.name(),
                source: DriverError { code: QHYCCD_ERROR },
            });
        }
        Ok(value)
    }

    pub fn set_usbtraffic(&mut self, usb_traffic: u32) -> Result<()> {
        self.set_control(Control::UsbTraffic, usb_traffic as f64)?;
        self.cache.usb_traffic = Some(usb_traffic);
        Ok(())
    }

    pub fn get_usbtraffic(&mut self) -> Result<u32> {
        if let Some(v) = self.cache.usb_traffic {
            return Ok(v);
        }
        let v = self.query_control(Control::UsbTraffic)? as u32;
        self.cache.usb_traffic = Some(v);
        Ok(v)
    }

    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        self.set_control(Control::Gain, gain)?;
        self.cache.gain = Some(gain);
        Ok(())
    }

    pub fn get_gain(&mut self) -> Result<f64> {
        if let Some(v) = self.cache.gain {
            return Ok(v);
        }
        let v = self.query_control(Control::Gain)?;
        self.cache.gain = Some(v);
        Ok(v)
    }

    pub fn set_offset(&mut self, offset: f64) -> Result<()> {
        self.set_control(Control::Offset, offset)?;
        self.cache.offset = Some(offset);
        Ok(())
    }

    pub fn get_offset(&mut self) -> Result<f64> {
        if let Some(v) = self.cache.offset {
            return Ok(v);
        }
        let v = self.query_control(Control::Offset)?;
        self.cache.offset = Some(v);
        Ok(v)
    }

    /// Set the exposure time in seconds.
    ///
    /// The driver works in whole microseconds; the fraction is dropped.
    pub fn set_exptime(&mut self, secs: f64) -> Result<()> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(Error::InvalidValue {
                what: "exposure time",
                value: secs.to_string(),
            });
        }
        let us = exposure_to_us(secs);
        self.set_control(Control::Exposure, us as f64)?;
        self.cache.exposure_us = Some(us);
        Ok(())
    }

    /// The exposure time in whole microseconds.
    pub fn get_exptime_us(&mut self) -> Result<u64> {
        if let Some(us) = self.cache.exposure_us {
            return Ok(us);
        }
        let us = self.query_control(Control::Exposure)? as u64;
        self.cache.exposure_us = Some(us);
        Ok(us)
    }

    /// The exposure time in seconds.
    pub fn get_exptime(&mut self) -> Result<f64> {
        Ok(self.get_exptime_us()? as f64 * 1e-6)
    }

    pub fn set_bitdepth(&mut self, bits: u32) -> Result<()> {
        if bits != 8 && bits != 16 {
            return Err(Error::InvalidValue {
                what: "bit depth",
                value: bits.to_string(),
            });
        }
        let handle = self.require(Control::TransferBit)?;
        self.driver
            .set_bits_mode(handle, bits)
            .check()
            .map_err(|source| Error::Config {
                setting: "bit depth",
                source,
            })?;
        self.cache.bit_depth = Some(bits);
        Ok(())
    }

    pub fn get_bitdepth(&mut self) -> Result<u32> {
        if let Some(v) = self.cache.bit_depth {
            return Ok(v);
        }
        let v = self.query_control(Control::TransferBit)? as u32;
        self.cache.bit_depth = Some(v);
        Ok(v)
    }

    /// Set `[horizontal, vertical]` binning.
    ///
    /// Symmetric binning up to 4x4 must be advertised by the camera; other
    /// combinations go straight to the driver.
    pub fn set_binsize(&mut self, bin: [u32; 2]) -> Result<()> {
        let [wbin, hbin] = bin;
        if wbin == 0 || hbin == 0 {
            return Err(Error::InvalidValue {
                what: "bin size",
                value: format!("{wbin}x{hbin}"),
            });
        }
        let handle = match Control::bin_mode(wbin).filter(|_| wbin == hbin) {
            Some(control) => self.require(control)?,
            None => self.handle()?,
        };
        self.driver
            .set_bin_mode(handle, wbin, hbin)
            .check()
            .map_err(|source| Error::Config {
                setting: "bin size",
                source,
            })?;
        self.cache.bin_size = Some(bin);
        Ok(())
    }

    /// `[1, 1]` until set.
    pub fn get_binsize(&self) -> [u32; 2] {
        self.cache.bin_size.unwrap_or([1, 1])
    }

    pub fn set_stream_mode(&mut self, mode: StreamMode) -> Result<()> {
        let handle = self.require(mode.control())?;
        self.driver
            .set_stream_mode(handle, mode.code())
            .check()
            .map_err(|source| Error::Config {
                setting: "stream mode",
                source,
            })?;
        self.cache.stream_mode = Some(mode);
        Ok(())
    }

    /// The driver has no getter, so this fails until the mode is set.
    pub fn get_stream_mode(&self) -> Result<StreamMode> {
        self.cache
            .stream_mode
            .ok_or(Error::State("stream mode has not been set"))
    }

    /// Sensor temperature in °C.
    pub fn get_temperature(&self) -> Result<f64> {
        self.query_control(Control::CurrentTemperature)
    }

    /// Cooler set point in °C.
    pub fn get_target_temperature(&self) -> Result<f64> {
        self.query_control(Control::Cooler)
    }

    pub fn set_target_temperature(&mut self, celsius: f64) -> Result<()> {
        self.set_control(Control::Cooler, celsius)
    }

    pub fn get_cooling_power(&self) -> Result<f64> {
        self.query_control(Control::CurrentPwm)
    }

    pub fn is_color(&self) -> Result<bool> {
        self.has_control(Control::Color)
    }

    /// Chip size, maximum image size, pixel size and bit depth.
    pub fn chip_info(&mut self) -> Result<ChipInfo> {
        if let Some(info) = self.cache.chip_info {
            return Ok(info);
        }
        let handle = self.handle()?;
        let mut info = ChipInfo::default();
        self.driver
            .chip_info(handle, &mut info)
            .check()
            .map_err(|source| Error::Driver {
                context: "GetQHYCCDChipInfo",
                source,
            })?;
        self.cache.chip_info = Some(info);
        Ok(info)
    }

    pub fn max_image_size(&mut self) -> Result<[u32; 2]> {
        Ok(self.chip_info()?.image_size)
    }

    pub fn overscan_area(&mut self) -> Result<Area> {
        if let Some(area) = self.cache.overscan {
            return Ok(area);
        }
        let handle = self.handle()?;
        let mut area = Area::default();
        self.driver
            .overscan_area(handle, &mut area)
            .check()
            .map_err(|source| Error::Driver {
                context: "GetQHYCCDOverScanArea",
                source,
            })?;
        self.cache.overscan = Some(area);
        Ok(area)
    }

    pub fn effective_area(&mut self) -> Result<Area> {
        if let Some(area) = self.cache.effective {
            return Ok(area);
        }
        let handle = self.handle()?;
        let mut area = Area::default();
        self.driver
            .effective_area(handle, &mut area)
            .check()
            .map_err(|source| Error::Driver {
                context: "GetQHYCCDEffectiveArea",
                source,
            })?;
        self.cache.effective = Some(area);
        Ok(area)
    }

    /// Set the readout region and allocate the image buffer for it.
    ///
    /// A `size` with zero area selects the full sensor. If a region was set
    /// before, any exposure or readout in progress is cancelled first.
    pub fn set_region(&mut self, start: [u32; 2], size: [u32; 2]) -> Result<()> {
        let handle = self.handle()?;
        let size = if size[0] == 0 || size[1] == 0 {
            self.max_image_size()?
        } else {
            size
        };
        if self.region_set {
            self.cancel_exposure()?;
        }
        let area = Area { start, size };
        self.driver
            .set_resolution(handle, area)
            .check()
            .map_err(|source| Error::Config {
                setting: "region",
                source,
            })?;
        let mem_length = self.driver.mem_length(handle) as usize;
        self.image = Some(ImageBuffer::new(size[0], size[1], mem_length));
        self.cache.region = Some(area);
        self.region_set = true;
        tracing::info!(
            "region {}x{} at ({}, {})",
            size[0],
            size[1],
            start[0],
            start[1]
        );
        Ok(())
    }

    /// The configured region, or the full sensor if none was set.
    pub fn get_region(&mut self) -> Result<Area> {
        match self.cache.region {
            Some(area) => Ok(area),
            None => Ok(Area {
                start: [0, 0],
                size: self.max_image_size()?,
            }),
        }
    }

    /// Abort any exposure or readout in progress.
    pub fn cancel_exposure(&self) -> Result<()> {
        let handle = self.handle()?;
        self.driver
            .cancel_exposing_and_readout(handle)
            .check()
            .map_err(|source| Error::Driver {
                context: "CancelQHYCCDExposingAndReadout",
                source,
            })?;
        Ok(())
    }

    /// Expose one frame and read it into the image buffer.
    ///
    /// Blocks for the exposure time plus readout.
    pub fn acquire(&mut self) -> Result<&ImageBuffer> {
        let handle = self.handle()?;
        let Some(image) = self.image.as_mut() else {
            return Err(Error::State("acquire called before the region was set"));
        };
        self.driver
            .exp_single_frame(handle)
            .check()
            .map_err(Error::Exposure)?;
        let mut info = FrameInfo::default();
        self.driver
            .get_single_frame(handle, &mut info, image.raw_mut())
            .check()
            .map_err(Error::Transfer)?;
        if info.width != image.width() || info.height != image.height() {
            tracing::warn!(
                "driver returned {}x{} frame for {}x{} region",
                info.width,
                info.height,
                image.width(),
                image.height()
            );
        }
        self.frames += 1;
        image.record(
            &info,
            HostTimingInfo {
                fno: self.frames,
                datetime: Utc::now(),
            },
        );
        Ok(&*image)
    }

    /// The buffer of the most recent frame, once a region is set.
    pub fn image(&self) -> Option<&ImageBuffer> {
        self.image.as_ref()
    }

    pub fn sdk_version(&mut self) -> Result<String> {
        if let Some(v) = &self.cache.sdk_version {
            return Ok(v.clone());
        }
        let mut raw = [0u32; 4];
        self.driver
            .sdk_version(&mut raw)
            .check()
            .map_err(|source| Error::Driver {
                context: "GetQHYCCDSDKVersion",
                source,
            })?;
        let v = format_sdk_version(raw);
        self.cache.sdk_version = Some(v.clone());
        Ok(v)
    }

    pub fn firmware_version(&mut self) -> Result<String> {
        if let Some(v) = &self.cache.firmware_version {
            return Ok(v.clone());
        }
        let handle = self.handle()?;
        let mut raw = [0u8; QHYCCD_FW_VERSION_LEN];
        self.driver
            .firmware_version(handle, &mut raw)
            .check()
            .map_err(|source| Error::Driver {
                context: "GetQHYCCDFWVersion",
                source,
            })?;
        let v = decode_firmware_version(&raw);
        self.cache.firmware_version = Some(v.clone());
        Ok(v)
    }

    /// Cancel readout, close the camera and release the driver resource.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        let mut first: Option<Error> = None;
        if let Some(handle) = self.handle.take() {
            if self.region_set {
                self.region_set = false;
                if let Err(source) = self.driver.cancel_exposing_and_readout(handle).check() {
                    first = first.or(Some(Error::Driver {
                        context: "CancelQHYCCDExposingAndReadout",
                        source,
                    }));
                }
            }
            if let Err(source) = self.driver.close(handle).check() {
                first = first.or(Some(Error::Driver {
                    context: "CloseQHYCCD",
                    source,
                }));
            }
            tracing::debug!("camera closed");
        }
        if self.resource_initialized {
            self.resource_initialized = false;
            if let Err(source) = self.driver.release_resource().check() {
                first = first.or(Some(Error::Resource(source)));
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::error!("closing camera session: {e}");
        }
    }
}
