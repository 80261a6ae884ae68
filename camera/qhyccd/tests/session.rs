use test_log::test;

use qhyccd::{
    Area, Control, Error, ErrorCode, Session, SessionConfig, SimulatedDriver, StreamMode,
    sim::{Call, pattern},
};

/// A config that touches no controls and leaves the region unset.
fn bare_config() -> SessionConfig {
    SessionConfig {
        usb_traffic: None,
        gain: None,
        offset: None,
        exposure_time: None,
        region_size: None,
        bin_size: None,
        bit_depth: None,
        ..Default::default()
    }
}

fn position(calls: &[Call], call: Call) -> usize {
    calls
        .iter()
        .position(|c| *c == call)
        .unwrap_or_else(|| panic!("{call:?} not called"))
}

#[test]
fn open_runs_sequence_in_order() {
    let sim = SimulatedDriver::new();
    let session = Session::open(sim.clone(), &SessionConfig::default()).unwrap();
    let calls = sim.calls();

    assert_eq!(calls[0], Call::SetLogLevel);
    let order = [
        Call::SdkVersion,
        Call::InitResource,
        Call::Scan,
        Call::CameraId,
        Call::Open,
        Call::FirmwareVersion,
        Call::IsControlAvailable(Control::SingleFrameMode),
        Call::SetStreamMode,
        Call::InitCamera,
        Call::SetParam(Control::UsbTraffic),
        Call::SetParam(Control::Gain),
        Call::SetParam(Control::Offset),
        Call::SetParam(Control::Exposure),
        Call::SetResolution,
        Call::SetBinMode,
        Call::SetBitsMode,
    ];
    let positions: Vec<usize> = order.iter().map(|c| position(&calls, *c)).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{calls:?}");

    assert!(sim.is_open());
    assert_eq!(sim.resource_refs(), 1);
    assert_eq!(sim.stream_mode(), Some(0));
    assert_eq!(sim.param(Control::UsbTraffic), Some(0.0));
    assert_eq!(sim.param(Control::Gain), Some(100.0));
    assert_eq!(sim.param(Control::Offset), Some(100.0));
    assert_eq!(sim.param(Control::Exposure), Some(100_000.0));
    assert_eq!(sim.bin(), [1, 1]);
    assert_eq!(sim.bits(), 16);
    assert_eq!(session.camera_id(), Some("QHY178M-sim0001"));
    assert_eq!(session.camera_count(), 1);
    assert_eq!(session.camera_index(), 0);
    assert_eq!(session.get_stream_mode().unwrap(), StreamMode::Single);
}

#[test]
fn unsupported_controls_never_reach_the_driver() {
    let sim = SimulatedDriver::new()
        .without_control(Control::Gain)
        .without_control(Control::Offset)
        .without_control(Control::UsbTraffic)
        .without_control(Control::Exposure)
        .without_control(Control::CurrentTemperature)
        .without_control(Control::Cooler)
        .without_control(Control::TransferBit)
        .without_control(Control::LiveVideoMode);
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    sim.clear_calls();

    assert!(matches!(session.get_gain(), Err(Error::Unsupported(Control::Gain))));
    assert!(matches!(session.set_gain(1.0), Err(Error::Unsupported(Control::Gain))));
    assert!(matches!(session.get_offset(), Err(Error::Unsupported(Control::Offset))));
    assert!(matches!(session.set_offset(1.0), Err(Error::Unsupported(Control::Offset))));
    assert!(matches!(
        session.get_usbtraffic(),
        Err(Error::Unsupported(Control::UsbTraffic))
    ));
    assert!(matches!(
        session.set_usbtraffic(3),
        Err(Error::Unsupported(Control::UsbTraffic))
    ));
    assert!(matches!(
        session.get_exptime(),
        Err(Error::Unsupported(Control::Exposure))
    ));
    assert!(matches!(
        session.set_exptime(1.0),
        Err(Error::Unsupported(Control::Exposure))
    ));
    assert!(matches!(
        session.get_temperature(),
        Err(Error::Unsupported(Control::CurrentTemperature))
    ));
    assert!(matches!(
        session.get_target_temperature(),
        Err(Error::Unsupported(Control::Cooler))
    ));
    assert!(matches!(
        session.set_target_temperature(-10.0),
        Err(Error::Unsupported(Control::Cooler))
    ));
    assert!(matches!(
        session.get_bitdepth(),
        Err(Error::Unsupported(Control::TransferBit))
    ));
    assert!(matches!(
        session.set_bitdepth(8),
        Err(Error::Unsupported(Control::TransferBit))
    ));
    assert!(matches!(
        session.set_stream_mode(StreamMode::Live),
        Err(Error::Unsupported(Control::LiveVideoMode))
    ));

    for call in sim.calls() {
        assert!(
            matches!(call, Call::IsControlAvailable(_)),
            "unexpected driver call {call:?}"
        );
    }
}

#[test]
fn set_then_get_hits_the_cache() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &SessionConfig::default()).unwrap();

    session.set_gain(42.0).unwrap();
    session.set_offset(7.5).unwrap();
    session.set_usbtraffic(12).unwrap();
    session.set_bitdepth(8).unwrap();
    session.set_binsize([2, 2]).unwrap();
    sim.clear_calls();

    assert_eq!(session.get_gain().unwrap(), 42.0);
    assert_eq!(session.get_offset().unwrap(), 7.5);
    assert_eq!(session.get_usbtraffic().unwrap(), 12);
    assert_eq!(session.get_bitdepth().unwrap(), 8);
    assert_eq!(session.get_binsize(), [2, 2]);
    assert_eq!(session.get_exptime_us().unwrap(), 100_000);
    assert!(sim.calls().is_empty(), "{:?}", sim.calls());

    assert!(session.has_control(Control::Gain).unwrap());
    assert!(session.has_control(Control::Gain).unwrap());
    assert_eq!(sim.count(Call::IsControlAvailable(Control::Gain)), 2);
}

#[test]
fn first_get_queries_once() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    sim.set_device_param(Control::Gain, 55.0);

    assert_eq!(session.get_gain().unwrap(), 55.0);
    sim.set_device_param(Control::Gain, 56.0);
    assert_eq!(session.get_gain().unwrap(), 55.0);
    assert_eq!(sim.count(Call::GetParam(Control::Gain)), 1);

    // A generic set drops the cached value.
    session.set_control(Control::Gain, 60.0).unwrap();
    assert_eq!(session.get_gain().unwrap(), 60.0);
    assert_eq!(sim.count(Call::GetParam(Control::Gain)), 2);
}

#[test]
fn temperatures_are_never_cached() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();

    sim.set_device_param(Control::CurrentTemperature, -10.0);
    assert_eq!(session.get_temperature().unwrap(), -10.0);
    sim.set_device_param(Control::CurrentTemperature, -12.5);
    assert_eq!(session.get_temperature().unwrap(), -12.5);
    assert_eq!(sim.count(Call::GetParam(Control::CurrentTemperature)), 2);

    session.set_target_temperature(-20.0).unwrap();
    assert_eq!(sim.param(Control::Cooler), Some(-20.0));
    assert_eq!(session.get_target_temperature().unwrap(), -20.0);
    assert_eq!(session.get_cooling_power().unwrap(), 0.0);
}

#[test]
fn query_control_rejects_error_sentinel() {
    let sim = SimulatedDriver::new();
    let session = Session::open(sim.clone(), &bare_config()).unwrap();
    sim.fail(Call::GetParam(Control::Speed), ErrorCode::Error);
    match session.query_control(Control::Speed) {
        Err(Error::Driver { source, .. }) => assert_eq!(source.kind(), Some(ErrorCode::Error)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn zero_size_region_is_full_frame() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    assert!(session.image().is_none());

    session.set_region([0, 0], [0, 0]).unwrap();
    let full = Area {
        start: [0, 0],
        size: [640, 480],
    };
    assert_eq!(session.get_region().unwrap(), full);
    assert_eq!(sim.resolution(), full);
    assert_eq!(session.image().unwrap().shape(), (480, 640));

    session.set_region([10, 20], [100, 50]).unwrap();
    assert_eq!(
        session.get_region().unwrap(),
        Area {
            start: [10, 20],
            size: [100, 50],
        }
    );
    assert_eq!(session.image().unwrap().shape(), (50, 100));
}

#[test]
fn unset_region_defaults_to_full_frame() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    let region = session.get_region().unwrap();
    assert_eq!(region.start, [0, 0]);
    assert_eq!(region.size, [640, 480]);
    session.get_region().unwrap();
    assert_eq!(sim.count(Call::ChipInfo), 1);
    assert_eq!(sim.count(Call::SetResolution), 0);
}

#[test]
fn reconfiguring_region_cancels_once() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    sim.clear_calls();

    session.set_region([0, 0], [100, 100]).unwrap();
    assert_eq!(sim.count(Call::CancelExposingAndReadout), 0);

    sim.clear_calls();
    session.set_region([0, 0], [200, 100]).unwrap();
    let calls = sim.calls();
    assert_eq!(sim.count(Call::CancelExposingAndReadout), 1);
    assert!(
        position(&calls, Call::CancelExposingAndReadout) < position(&calls, Call::SetResolution)
    );
}

#[test]
fn exposure_is_truncated_to_microseconds() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();

    session.set_exptime(0.0001234).unwrap();
    assert_eq!(sim.param(Control::Exposure), Some(123.0));
    assert_eq!(session.get_exptime_us().unwrap(), 123);
    let secs = session.get_exptime().unwrap();
    approx::assert_relative_eq!(secs, 0.000123, max_relative = 1e-12);
    assert!((secs - 0.0001234).abs() > 1e-9);

    for (secs, us) in [(9.999999e-7, 0.0), (1.9999999999e-6, 1.0), (1.000001, 1_000_000.0)] {
        session.set_exptime(secs).unwrap();
        assert_eq!(sim.param(Control::Exposure), Some(us), "{secs}");
    }
}

#[test]
fn invalid_values_are_rejected_before_the_driver() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    sim.clear_calls();

    for secs in [-1.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            session.set_exptime(secs),
            Err(Error::InvalidValue { .. })
        ));
    }
    assert!(matches!(
        session.set_bitdepth(12),
        Err(Error::InvalidValue { .. })
    ));
    assert!(matches!(
        session.set_binsize([0, 1]),
        Err(Error::InvalidValue { .. })
    ));
    assert!(sim.calls().is_empty());
}

#[test]
fn binning() {
    let sim = SimulatedDriver::new().without_control(Control::Bin3x3Mode);
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    assert_eq!(session.get_binsize(), [1, 1]);

    session.set_binsize([2, 2]).unwrap();
    assert_eq!(sim.bin(), [2, 2]);
    assert!(matches!(
        session.set_binsize([3, 3]),
        Err(Error::Unsupported(Control::Bin3x3Mode))
    ));
    assert_eq!(session.get_binsize(), [2, 2]);

    session.set_binsize([1, 2]).unwrap();
    assert_eq!(sim.bin(), [1, 2]);
}

#[test]
fn no_camera() {
    let sim = SimulatedDriver::new().with_cameras(Vec::<String>::new());
    let result = Session::open(sim.clone(), &SessionConfig::default());
    assert!(matches!(result, Err(Error::NoDevice)));
    assert_eq!(sim.count(Call::Open), 0);
    assert_eq!(sim.count(Call::ReleaseResource), 1);
    assert_eq!(sim.resource_refs(), 0);
}

#[test]
fn index_out_of_range() {
    let sim = SimulatedDriver::new().with_cameras(["QHY-a", "QHY-b"]);
    let cfg = SessionConfig {
        camera_index: 3,
        ..Default::default()
    };
    let result = Session::open(sim.clone(), &cfg);
    assert!(matches!(
        result,
        Err(Error::NoMatch { index: 3, count: 2 })
    ));
    assert_eq!(sim.count(Call::Open), 0);
    assert_eq!(sim.count(Call::CameraId), 0);
    assert_eq!(sim.resource_refs(), 0);
}

#[test]
fn select_second_camera() {
    let sim = SimulatedDriver::new().with_cameras(["QHY-a", "QHY-b"]);
    let cfg = SessionConfig {
        camera_index: 1,
        ..bare_config()
    };
    let session = Session::open(sim.clone(), &cfg).unwrap();
    assert_eq!(session.camera_id(), Some("QHY-b"));
    assert_eq!(session.camera_count(), 2);
    assert_eq!(session.camera_index(), 1);
}

#[test]
fn null_handle_is_an_open_error() {
    let sim = SimulatedDriver::new().with_null_handle();
    match Session::open(sim.clone(), &SessionConfig::default()) {
        Err(Error::Open { id }) => assert_eq!(id, "QHY178M-sim0001"),
        other => panic!("unexpected {:?}", other.err()),
    }
    assert_eq!(sim.count(Call::Close), 0);
    assert_eq!(sim.resource_refs(), 0);
}

#[test]
fn resource_failure() {
    let sim = SimulatedDriver::new();
    sim.fail(Call::InitResource, ErrorCode::InitResource);
    match Session::open(sim.clone(), &SessionConfig::default()) {
        Err(Error::Resource(e)) => assert_eq!(e.kind(), Some(ErrorCode::InitResource)),
        other => panic!("unexpected {:?}", other.err()),
    }
    assert_eq!(sim.count(Call::Scan), 0);
    assert_eq!(sim.count(Call::ReleaseResource), 0);
}

#[test]
fn camera_without_single_frame_mode_is_refused() {
    let sim = SimulatedDriver::new().without_control(Control::SingleFrameMode);
    let result = Session::open(sim.clone(), &SessionConfig::default());
    assert!(matches!(
        result,
        Err(Error::Unsupported(Control::SingleFrameMode))
    ));
    assert_eq!(sim.count(Call::SetStreamMode), 0);
    assert_eq!(sim.count(Call::InitCamera), 0);
    assert!(!sim.is_open());
    assert_eq!(sim.resource_refs(), 0);
}

#[test]
fn acquire_before_region_is_a_state_error() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    assert!(matches!(session.acquire(), Err(Error::State(_))));
    assert!(session.image().is_none());
    assert_eq!(sim.count(Call::ExpSingleFrame), 0);
}

#[test]
fn acquire_frames() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &SessionConfig::default()).unwrap();

    let image = session.acquire().unwrap();
    assert_eq!(image.shape(), (480, 640));
    assert_eq!(image.bit_depth(), 16);
    assert_eq!(image.channels(), 1);
    assert_eq!(image.as_bytes().len(), 640 * 480 * 2);
    let samples = image.samples();
    assert_eq!(samples[0], pattern(100, 0, 0, 1));
    assert_eq!(samples[641], pattern(100, 1, 1, 1));
    assert_eq!(image.host_timing().unwrap().fno, 1);
    assert!(image.acquired_at().is_some());

    session.set_bitdepth(8).unwrap();
    let image = session.acquire().unwrap();
    assert_eq!(image.bit_depth(), 8);
    assert_eq!(image.bytes_per_sample(), 1);
    assert_eq!(image.as_bytes().len(), 640 * 480);
    assert_eq!(image.samples()[5], pattern(100, 5, 0, 2) & 0xff);
    assert_eq!(image.host_timing().unwrap().fno, 2);
}

#[test]
fn acquire_failures() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &SessionConfig::default()).unwrap();

    sim.fail(Call::ExpSingleFrame, ErrorCode::ExpFailed);
    match session.acquire() {
        Err(Error::Exposure(e)) => assert_eq!(e.kind(), Some(ErrorCode::ExpFailed)),
        other => panic!("unexpected {:?}", other.err()),
    }
    assert_eq!(sim.count(Call::GetSingleFrame), 0);

    sim.clear_failures();
    sim.fail(Call::GetSingleFrame, ErrorCode::GettingFailed);
    match session.acquire() {
        Err(Error::Transfer(e)) => assert_eq!(e.kind(), Some(ErrorCode::GettingFailed)),
        other => panic!("unexpected {:?}", other.err()),
    }
}

#[test]
fn region_rejected_by_driver_is_a_config_error() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    match session.set_region([600, 0], [100, 100]) {
        Err(Error::Config { setting, source }) => {
            assert_eq!(setting, "region");
            assert_eq!(source.kind(), Some(ErrorCode::SetResolution));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(session.image().is_none());
}

#[test]
fn close_tears_down_in_order() {
    let sim = SimulatedDriver::new();
    let session = Session::open(sim.clone(), &SessionConfig::default()).unwrap();
    sim.clear_calls();
    session.close().unwrap();
    assert_eq!(
        sim.calls(),
        vec![
            Call::CancelExposingAndReadout,
            Call::Close,
            Call::ReleaseResource
        ]
    );
    assert!(!sim.is_open());
    assert_eq!(sim.resource_refs(), 0);
}

#[test]
fn close_without_region_skips_cancel() {
    let sim = SimulatedDriver::new();
    let session = Session::open(sim.clone(), &bare_config()).unwrap();
    sim.clear_calls();
    drop(session);
    assert_eq!(sim.calls(), vec![Call::Close, Call::ReleaseResource]);
}

#[test]
fn teardown_continues_after_failure() {
    let sim = SimulatedDriver::new();
    let session = Session::open(sim.clone(), &SessionConfig::default()).unwrap();
    sim.fail(Call::CancelExposingAndReadout, ErrorCode::Error);
    sim.fail(Call::Close, ErrorCode::Error);
    match session.close() {
        Err(Error::Driver { context, .. }) => {
            assert_eq!(context, "CancelQHYCCDExposingAndReadout")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(sim.count(Call::Close), 1);
    assert_eq!(sim.count(Call::ReleaseResource), 1);
    assert_eq!(sim.resource_refs(), 0);
}

#[test]
fn versions() {
    let sim = SimulatedDriver::new()
        .with_firmware([0x09, 0x1c])
        .with_sdk_version([21, 3, 9, 2]);
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    assert_eq!(session.firmware_version().unwrap(), "2016_09_28");
    assert_eq!(session.sdk_version().unwrap(), "20210309_2");
    assert_eq!(sim.count(Call::FirmwareVersion), 1);
    assert_eq!(sim.count(Call::SdkVersion), 1);

    let sim = SimulatedDriver::new().with_firmware([0xb4, 0x0a]);
    let mut session = Session::open(sim, &bare_config()).unwrap();
    assert_eq!(session.firmware_version().unwrap(), "2011_04_10");
}

#[test]
fn sensor_areas_are_cached() {
    let overscan = Area {
        start: [0, 0],
        size: [16, 480],
    };
    let effective = Area {
        start: [16, 0],
        size: [624, 480],
    };
    let sim = SimulatedDriver::new().with_overscan(overscan, effective);
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    assert_eq!(session.overscan_area().unwrap(), overscan);
    assert_eq!(session.overscan_area().unwrap(), overscan);
    assert_eq!(session.effective_area().unwrap(), effective);
    assert_eq!(session.effective_area().unwrap(), effective);
    assert_eq!(sim.count(Call::OverscanArea), 1);
    assert_eq!(sim.count(Call::EffectiveArea), 1);

    let chip = session.chip_info().unwrap();
    approx::assert_relative_eq!(chip.pixel_size_um[0], 3.76);
    assert_eq!(chip.image_size, [640, 480]);
}

#[test]
fn color_and_controls() {
    let sim = SimulatedDriver::new();
    let session = Session::open(sim, &bare_config()).unwrap();
    assert!(!session.is_color().unwrap());
    let controls = session.available_controls().unwrap();
    assert!(controls.contains(&Control::Gain));
    assert!(!controls.contains(&Control::Color));

    let sim = SimulatedDriver::new().with_control(Control::Color, None);
    let session = Session::open(sim, &bare_config()).unwrap();
    assert!(session.is_color().unwrap());
}

#[test]
fn live_mode() {
    let sim = SimulatedDriver::new();
    let mut session = Session::open(sim.clone(), &bare_config()).unwrap();
    session.set_stream_mode(StreamMode::Live).unwrap();
    assert_eq!(sim.stream_mode(), Some(1));
    assert_eq!(session.get_stream_mode().unwrap(), StreamMode::Live);
}
