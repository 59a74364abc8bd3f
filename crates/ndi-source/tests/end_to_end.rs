//! Full ingest path against the synthetic network and the memory renderer

use std::sync::Arc;
use std::time::Duration;

use ndi_recv::synthetic::SyntheticFeed;
use ndi_recv::{
    CaptureMode, FourCC, Rational, ReceiverConfig, Resolution, ScanFormat, Source, SourceFrame,
};
use ndi_source::{
    Cadence, Instance, NdiSource, Priority, SourceConfig, SourceError, SourceState,
};
use ndi_video::{ColorFormat, ColorModel, MemoryRenderer};

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;
const STRIDE: usize = WIDTH as usize * 2;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// 1080p29.97 UYVY with a position dependent pattern
fn push_uyvy(feed: &SyntheticFeed) -> Vec<u8> {
    let template = SourceFrame::new(
        Resolution::new(WIDTH, HEIGHT),
        FourCC::UYVY,
        Rational::new(30000, 1001),
        0.0,
        ScanFormat::Progressive,
    );
    let data: Vec<u8> = (0..STRIDE * HEIGHT as usize)
        .map(|i| ((i * 31 + i / STRIDE) % 251) as u8)
        .collect();
    feed.push_frame(template, STRIDE, data.clone());
    data
}

struct Setup {
    instance: Arc<Instance>,
    feed: SyntheticFeed,
    renderer: MemoryRenderer,
    source: NdiSource,
}

fn setup(capture_mode: CaptureMode) -> Setup {
    init_tracing();
    let instance = Instance::new();
    let feed = SyntheticFeed::new();
    // Only the two-plane 4:2:2 layout, so UYVY must be de-interleaved
    let renderer = MemoryRenderer::new(ColorFormat::G8B8R8TwoPlane.into());
    let config = SourceConfig {
        receiver: ReceiverConfig {
            capture_mode,
            capture_timeout_ms: 10,
            ..Default::default()
        },
        ..Default::default()
    };
    let source = NdiSource::new(
        &instance,
        "Program",
        Source::new("STUDIO (Camera 1)").expect("valid"),
        Arc::new(feed.backend()),
        Arc::new(renderer.clone()),
        config,
    )
    .expect("source");

    Setup {
        instance,
        feed,
        renderer,
        source,
    }
}

#[test]
fn test_uyvy_to_two_plane_end_to_end() {
    let mut s = setup(CaptureMode::FrameSync);
    let data = push_uyvy(&s.feed);

    let mut lock = s.instance.lock();
    s.source.open(&mut lock).expect("open");
    assert_eq!(s.source.state(), SourceState::Idle);

    s.source.on_tick(&mut lock).expect("tick");
    let compatibility = lock
        .schedule(s.source.id())
        .take_published()
        .expect("geometry change publishes");
    assert_eq!(compatibility.len(), 1);
    let mode = &compatibility[0];
    assert_eq!(mode.formats(), &[ColorFormat::G8B8R8TwoPlane]);
    assert_eq!(mode.resolution, Resolution::new(WIDTH, HEIGHT));
    assert_eq!(mode.frame_rate, Rational::new(30000, 1001));
    assert_eq!(mode.color_model, ColorModel::Bt709);

    assert!(s
        .source
        .on_mode_proposal(&mut lock, Some(mode))
        .expect("accepted"));
    assert_eq!(s.source.state(), SourceState::Streaming);
    assert_eq!(
        lock.schedule(s.source.id()).cadence(),
        Cadence::Periodic(Priority::INPUT, Duration::from_nanos(33_366_666))
    );
    drop(lock);

    let first = s.source.pull().expect("pull").expect("staged frame");
    let planes = first.planes();
    assert_eq!(planes.len(), 2);
    assert_eq!(planes[0].len(), WIDTH as usize * HEIGHT as usize);
    assert_eq!(planes[1].len(), WIDTH as usize * HEIGHT as usize);
    for (k, (&luma, &chroma)) in planes[0].iter().zip(planes[1].iter()).enumerate() {
        assert_eq!(luma, data[2 * k + 1], "luma sample {}", k);
        assert_eq!(chroma, data[2 * k], "chroma sample {}", k);
    }

    // Cached until the next capture
    let second = s.source.pull().expect("pull").expect("staged frame");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(s.renderer.stats().frames_acquired, 1);
    assert_eq!(s.renderer.stats().frames_flushed, 1);

    // The source frame went back to the network right after the copy
    let stats = s.feed.stats();
    assert_eq!((stats.captures, stats.frees, stats.outstanding), (1, 1, 0));
    let last = s.source.last_frame().expect("open");
    assert!(!last.is_held());
    assert_eq!(last.resolution(), Resolution::new(WIDTH, HEIGHT));

    // Same geometry: nothing republished, but a fresh conversion
    let mut lock = s.instance.lock();
    s.source.on_tick(&mut lock).expect("tick");
    assert!(lock.schedule(s.source.id()).take_published().is_none());
    drop(lock);
    let third = s.source.pull().expect("pull").expect("staged frame");
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(s.renderer.stats().uploaders_created, 1);

    s.source.close(&mut s.instance.lock()).expect("close");
    assert_eq!(s.source.state(), SourceState::Closed);
    assert!(s.source.pull().expect("pull").is_none());
    assert_eq!(s.feed.stats().outstanding, 0);
}

#[test]
fn test_close_without_capture_frees_nothing() {
    let mut s = setup(CaptureMode::FrameSync);

    s.source.open(&mut s.instance.lock()).expect("open");
    s.source.close(&mut s.instance.lock()).expect("close");

    let stats = s.feed.stats();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.captures, 0);
    assert_eq!(stats.frees, 0);
}

#[test]
fn test_held_frame_is_freed_on_close() {
    let mut s = setup(CaptureMode::FrameSync);
    push_uyvy(&s.feed);

    let mut lock = s.instance.lock();
    s.source.open(&mut lock).expect("open");
    s.source.on_tick(&mut lock).expect("tick");
    assert_eq!(s.feed.stats().outstanding, 1);

    s.source.close(&mut lock).expect("close");
    let stats = s.feed.stats();
    assert_eq!((stats.captures, stats.frees, stats.outstanding), (1, 1, 0));
}

#[test]
fn test_lifecycle_contract_violations() {
    let mut s = setup(CaptureMode::FrameSync);
    let mut lock = s.instance.lock();

    assert!(matches!(
        s.source.on_tick(&mut lock),
        Err(SourceError::InvalidState(_))
    ));

    s.source.open(&mut lock).expect("open");
    assert!(matches!(
        s.source.open(&mut lock),
        Err(SourceError::InvalidState(_))
    ));
    s.source.close(&mut lock).expect("close");
}

#[test]
fn test_direct_capture_keeps_frame_on_timeout() {
    let mut s = setup(CaptureMode::Direct);
    push_uyvy(&s.feed);

    let mut lock = s.instance.lock();
    s.source.open(&mut lock).expect("open");
    s.source.on_tick(&mut lock).expect("tick");
    let compatibility = lock
        .schedule(s.source.id())
        .take_published()
        .expect("published");
    s.source
        .on_mode_proposal(&mut lock, compatibility.first())
        .expect("accepted");
    drop(lock);

    let first = s.source.pull().expect("pull").expect("staged frame");

    // Queue is drained: the tick times out and the cached output stays
    s.source.on_tick(&mut s.instance.lock()).expect("tick");
    let again = s.source.pull().expect("pull").expect("staged frame");
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(s.renderer.stats().frames_acquired, 1);

    s.source.close(&mut s.instance.lock()).expect("close");
    let stats = s.feed.stats();
    assert_eq!((stats.captures, stats.frees, stats.outstanding), (1, 1, 0));
}

#[test]
fn test_receiver_named_after_host() {
    let mut s = setup(CaptureMode::FrameSync);
    s.source.open(&mut s.instance.lock()).expect("open");

    let names = s.feed.stats().receiver_names;
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(" (Program)") || names[0] == "Program");

    s.source.close(&mut s.instance.lock()).expect("close");
}
