//! An in-process camera implementing [Driver].
//!
//! Clones share state, so a test can keep a handle to a driver it has
//! moved into a [crate::Session] and inspect the calls made.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    ffi::CStr,
    os::raw::c_void,
    ptr::NonNull,
    sync::Arc,
};

use parking_lot::Mutex;
use qhyccd_sys::{QHYCCD_ERROR, QHYCCD_FW_VERSION_LEN, QHYCCD_ID_LEN};

use crate::{
    control::Control,
    driver::{Area, ChipInfo, DeviceHandle, Driver, FrameInfo},
    status::{ErrorCode, Status},
};

/// A driver entry point, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    SetLogLevel,
    InitResource,
    ReleaseResource,
    Scan,
    CameraId,
    Open,
    Close,
    InitCamera,
    IsControlAvailable(Control),
    GetParam(Control),
    SetParam(Control),
    SetBitsMode,
    SetStreamMode,
    SetBinMode,
    SetResolution,
    MemLength,
    ExpSingleFrame,
    GetSingleFrame,
    ChipInfo,
    OverscanArea,
    EffectiveArea,
    SdkVersion,
    FirmwareVersion,
    CancelExposingAndReadout,
}

struct SimState {
    cameras: Vec<String>,
    available: BTreeSet<Control>,
    params: BTreeMap<Control, f64>,
    chip: ChipInfo,
    overscan: Area,
    effective: Area,
    firmware: [u8; QHYCCD_FW_VERSION_LEN],
    sdk: [u32; 4],
    null_handle: bool,
    failures: HashMap<Call, Status>,
    calls: Vec<Call>,
    resource_refs: i32,
    open: bool,
    resolution: Area,
    bin: [u32; 2],
    bits: u32,
    stream_mode: Option<u8>,
    frames: u32,
}

#[derive(Clone)]
pub struct SimulatedDriver {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// One monochrome 640x480 camera with the usual controls.
    pub fn new() -> Self {
        let available: BTreeSet<Control> = [
            Control::Gain,
            Control::Offset,
            Control::Exposure,
            Control::Speed,
            Control::TransferBit,
            Control::UsbTraffic,
            Control::CurrentTemperature,
            Control::CurrentPwm,
            Control::ManualPwm,
            Control::Cooler,
            Control::Bin1x1Mode,
            Control::Bin2x2Mode,
            Control::Bin3x3Mode,
            Control::Bin4x4Mode,
            Control::Bits8,
            Control::Bits16,
            Control::SingleFrameMode,
            Control::LiveVideoMode,
        ]
        .into_iter()
        .collect();
        let params = [
            (Control::Gain, 0.0),
            (Control::Offset, 0.0),
            (Control::Exposure, 1000.0),
            (Control::Speed, 0.0),
            (Control::TransferBit, 16.0),
            (Control::UsbTraffic, 30.0),
            (Control::CurrentTemperature, 21.5),
            (Control::CurrentPwm, 0.0),
            (Control::ManualPwm, 0.0),
            (Control::Cooler, 0.0),
        ]
        .into_iter()
        .collect();
        let chip = ChipInfo {
            chip_size_mm: [2.4064, 1.8048],
            image_size: [640, 480],
            pixel_size_um: [3.76, 3.76],
            bpp: 16,
        };
        let mut firmware = [0u8; QHYCCD_FW_VERSION_LEN];
        firmware[0] = 0x9b;
        firmware[1] = 0x14;
        let state = SimState {
            cameras: vec!["QHY178M-sim0001".to_string()],
            available,
            params,
            chip,
            overscan: Area {
                start: [0, 0],
                size: [0, 0],
            },
            effective: Area {
                start: [0, 0],
                size: chip.image_size,
            },
            firmware,
            sdk: [24, 3, 15, 0],
            null_handle: false,
            failures: HashMap::new(),
            calls: Vec::new(),
            resource_refs: 0,
            open: false,
            resolution: Area::default(),
            bin: [1, 1],
            bits: 16,
            stream_mode: None,
            frames: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_cameras<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().cameras = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_control(self, control: Control, value: Option<f64>) -> Self {
        {
            let mut state = self.state.lock();
            state.available.insert(control);
            if let Some(value) = value {
                state.params.insert(control, value);
            }
        }
        self
    }

    pub fn without_control(self, control: Control) -> Self {
        self.state.lock().available.remove(&control);
        self
    }

    pub fn with_chip(self, chip: ChipInfo) -> Self {
        {
            let mut state = self.state.lock();
            state.chip = chip;
            state.effective = Area {
                start: [0, 0],
                size: chip.image_size,
            };
        }
        self
    }

    pub fn with_overscan(self, overscan: Area, effective: Area) -> Self {
        {
            let mut state = self.state.lock();
            state.overscan = overscan;
            state.effective = effective;
        }
        self
    }

    pub fn with_firmware(self, bytes: [u8; 2]) -> Self {
        {
            let mut state = self.state.lock();
            state.firmware[0] = bytes[0];
            state.firmware[1] = bytes[1];
        }
        self
    }

    pub fn with_sdk_version(self, version: [u32; 4]) -> Self {
        self.state.lock().sdk = version;
        self
    }

    /// `OpenQHYCCD` returns null.
    pub fn with_null_handle(self) -> Self {
        self.state.lock().null_handle = true;
        self
    }

    /// Make every subsequent `call` return `code`.
    pub fn fail(&self, call: Call, code: ErrorCode) {
        self.state.lock().failures.insert(call, Status::from(code));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// The value a control holds on the device.
    pub fn param(&self, control: Control) -> Option<f64> {
        self.state.lock().params.get(&control).copied()
    }

    pub fn set_device_param(&self, control: Control, value: f64) {
        self.state.lock().params.insert(control, value);
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Outstanding `InitQHYCCDResource` calls not yet released.
    pub fn resource_refs(&self) -> i32 {
        self.state.lock().resource_refs
    }

    pub fn resolution(&self) -> Area {
        self.state.lock().resolution
    }

    pub fn bin(&self) -> [u32; 2] {
        self.state.lock().bin
    }

    pub fn bits(&self) -> u32 {
        self.state.lock().bits
    }

    pub fn stream_mode(&self) -> Option<u8> {
        self.state.lock().stream_mode
    }

    fn handle() -> DeviceHandle {
        DeviceHandle::from(NonNull::<c_void>::dangling())
    }
}

impl SimState {
    /// Log `call` and return any injected failure.
    fn enter(&mut self, call: Call) -> Option<Status> {
        self.calls.push(call);
        self.failures.get(&call).copied()
    }
}

/// Sample at `(x, y)` of frame number `frame`.
pub fn pattern(base: u16, x: u32, y: u32, frame: u32) -> u16 {
    base.saturating_add(((x + y + frame) % 64) as u16)
}

impl Driver for SimulatedDriver {
    fn set_log_level(&self, _level: u8) -> Status {
        let mut s = self.state.lock();
        s.enter(Call::SetLogLevel).unwrap_or(Status::SUCCESS)
    }

    fn init_resource(&self) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::InitResource) {
            return status;
        }
        s.resource_refs += 1;
        Status::SUCCESS
    }

    fn release_resource(&self) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::ReleaseResource) {
            return status;
        }
        s.resource_refs -= 1;
        Status::SUCCESS
    }

    fn scan(&self) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::Scan) {
            return status;
        }
        Status(s.cameras.len() as u32)
    }

    fn camera_id(&self, index: u32, id: &mut [u8; QHYCCD_ID_LEN]) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::CameraId) {
            return status;
        }
        let Some(name) = s.cameras.get(index as usize) else {
            return ErrorCode::NoMatch.into();
        };
        let n = name.len().min(QHYCCD_ID_LEN - 1);
        id.fill(0);
        id[..n].copy_from_slice(&name.as_bytes()[..n]);
        Status::SUCCESS
    }

    fn open(&self, id: &CStr) -> Option<DeviceHandle> {
        let mut s = self.state.lock();
        if s.enter(Call::Open).is_some() || s.null_handle {
            return None;
        }
        let id = id.to_str().ok()?;
        if !s.cameras.iter().any(|c| c == id) {
            return None;
        }
        s.open = true;
        Some(Self::handle())
    }

    fn close(&self, _handle: DeviceHandle) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::Close) {
            return status;
        }
        s.open = false;
        Status::SUCCESS
    }

    fn init_camera(&self, _handle: DeviceHandle) -> Status {
        let mut s = self.state.lock();
        s.enter(Call::InitCamera).unwrap_or(Status::SUCCESS)
    }

    fn is_control_available(&self, _handle: DeviceHandle, control: Control) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::IsControlAvailable(control)) {
            return status;
        }
        if s.available.contains(&control) {
            Status::SUCCESS
        } else {
            Status(QHYCCD_ERROR)
        }
    }

    fn get_param(&self, _handle: DeviceHandle, control: Control) -> f64 {
        let mut s = self.state.lock();
        if s.enter(Call::GetParam(control)).is_some() || !s.available.contains(&control) {
            return QHYCCD_ERROR as f64;
        }
        s.params.get(&control).copied().unwrap_or(0.0)
    }

    fn set_param(&self, _handle: DeviceHandle, control: Control, value: f64) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::SetParam(control)) {
            return status;
        }
        if !s.available.contains(&control) {
            return ErrorCode::SetParams.into();
        }
        s.params.insert(control, value);
        Status::SUCCESS
    }

    fn set_bits_mode(&self, _handle: DeviceHandle, bits: u32) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::SetBitsMode) {
            return status;
        }
        if bits != 8 && bits != 16 {
            return ErrorCode::SetParams.into();
        }
        s.bits = bits;
        s.params.insert(Control::TransferBit, bits as f64);
        Status::SUCCESS
    }

    fn set_stream_mode(&self, _handle: DeviceHandle, mode: u8) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::SetStreamMode) {
            return status;
        }
        s.stream_mode = Some(mode);
        Status::SUCCESS
    }

    fn set_bin_mode(&self, _handle: DeviceHandle, wbin: u32, hbin: u32) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::SetBinMode) {
            return status;
        }
        if wbin == 0 || hbin == 0 {
            return ErrorCode::SetParams.into();
        }
        s.bin = [wbin, hbin];
        Status::SUCCESS
    }

    fn set_resolution(&self, _handle: DeviceHandle, area: Area) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::SetResolution) {
            return status;
        }
        let [maxw, maxh] = s.chip.image_size;
        let fits = area.size[0] > 0
            && area.size[1] > 0
            && area.start[0].saturating_add(area.size[0]) <= maxw
            && area.start[1].saturating_add(area.size[1]) <= maxh;
        if !fits {
            return ErrorCode::SetResolution.into();
        }
        s.resolution = area;
        Status::SUCCESS
    }

    fn mem_length(&self, _handle: DeviceHandle) -> u32 {
        let mut s = self.state.lock();
        let _ = s.enter(Call::MemLength);
        let [w, h] = s.chip.image_size;
        w * h * 2
    }

    fn exp_single_frame(&self, _handle: DeviceHandle) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::ExpSingleFrame) {
            return status;
        }
        s.frames += 1;
        Status::SUCCESS
    }

    fn get_single_frame(
        &self,
        _handle: DeviceHandle,
        info: &mut FrameInfo,
        data: &mut [u8],
    ) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::GetSingleFrame) {
            return status;
        }
        if s.frames == 0 {
            return ErrorCode::GettingFailed.into();
        }
        let [width, height] = s.resolution.size;
        let bytes_per_sample = (s.bits / 8) as usize;
        if data.len() < width as usize * height as usize * bytes_per_sample {
            return ErrorCode::GettingFailed.into();
        }
        let base = s.params.get(&Control::Offset).copied().unwrap_or(0.0) as u16;
        let frame = s.frames;
        let mut pos = 0;
        for y in 0..height {
            for x in 0..width {
                let v = pattern(base, x, y, frame);
                if bytes_per_sample == 1 {
                    data[pos] = v as u8;
                } else {
                    data[pos..pos + 2].copy_from_slice(&v.to_ne_bytes());
                }
                pos += bytes_per_sample;
            }
        }
        *info = FrameInfo {
            width,
            height,
            bpp: s.bits,
            channels: 1,
        };
        Status::SUCCESS
    }

    fn chip_info(&self, _handle: DeviceHandle, info: &mut ChipInfo) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::ChipInfo) {
            return status;
        }
        *info = s.chip;
        Status::SUCCESS
    }

    fn overscan_area(&self, _handle: DeviceHandle, area: &mut Area) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::OverscanArea) {
            return status;
        }
        *area = s.overscan;
        Status::SUCCESS
    }

    fn effective_area(&self, _handle: DeviceHandle, area: &mut Area) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::EffectiveArea) {
            return status;
        }
        *area = s.effective;
        Status::SUCCESS
    }

    fn sdk_version(&self, version: &mut [u32; 4]) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::SdkVersion) {
            return status;
        }
        *version = s.sdk;
        Status::SUCCESS
    }

    fn firmware_version(
        &self,
        _handle: DeviceHandle,
        buf: &mut [u8; QHYCCD_FW_VERSION_LEN],
    ) -> Status {
        let mut s = self.state.lock();
        if let Some(status) = s.enter(Call::FirmwareVersion) {
            return status;
        }
        *buf = s.firmware;
        Status::SUCCESS
    }

    fn cancel_exposing_and_readout(&self, _handle: DeviceHandle) -> Status {
        let mut s = self.state.lock();
        s.enter(Call::CancelExposingAndReadout)
            .unwrap_or(Status::SUCCESS)
    }
}
