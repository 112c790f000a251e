use std::io::Cursor;
use std::time::Duration;

use crossbeam_channel::Receiver;

use super::*;
use crate::assets::decode::to_data_uri;
use crate::foundation::error::ErrorKind;
use crate::scheduler::shared::SchedulerOptions;
use crate::scheduler::tiers::QualityTier;
use crate::worker::context::ContextOptions;

const WAIT: Duration = Duration::from_secs(20);

fn fast_scheduler() -> PreviewScheduler {
    PreviewScheduler::new(SchedulerOptions {
        tiers: vec![
            QualityTier::new(Some(16), 0),
            QualityTier::new(Some(32), 20),
            QualityTier::new(None, 40),
        ],
        ..SchedulerOptions::default()
    })
    .unwrap()
}

fn png_source(w: u32, h: u32) -> ImageSource {
    let img = image::RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([(x * 7) as u8, (y * 5) as u8, 200, 255])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    ImageSource::data_uri(to_data_uri("image/png", &buf))
}

fn wait_for_tier(rx: &Receiver<PreviewEvent>, generation: u64, tier: usize) -> Vec<PreviewEvent> {
    let mut seen = Vec::new();
    loop {
        let event = rx.recv_timeout(WAIT).expect("preview event");
        let done = matches!(
            &event,
            PreviewEvent::Displayed { generation: g, tier: t, .. } if *g == generation && *t == tier
        );
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[test]
fn tiers_arrive_in_increasing_quality() {
    let scheduler = fast_scheduler();
    let (preview, rx) = scheduler.open_preview();
    let params = CompositingParameters::default();
    let generation = preview
        .update(Some(ImageId::new("a")), Some(png_source(40, 60)), &params)
        .unwrap();

    let events = wait_for_tier(&rx, generation, 2);
    let tiers: Vec<usize> = events
        .iter()
        .map(|e| match e {
            PreviewEvent::Displayed { tier, .. } => *tier,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert!(tiers.windows(2).all(|w| w[0] < w[1]), "{tiers:?}");
    assert_eq!(preview.phase(), PreviewPhase::Displaying { tier: 2 });

    let PreviewEvent::Displayed { handle, .. } = events.last().unwrap() else {
        unreachable!()
    };
    assert_eq!(preview.active_handle().as_ref(), Some(handle));
    let image = scheduler.registry().resolve(handle).unwrap();
    assert_eq!((image.width, image.height), (40, 93));
    // Replaced tiers were revoked.
    assert_eq!(scheduler.registry().live_count(), 1);
}

#[test]
fn rapid_updates_never_go_back_in_generation() {
    let scheduler = fast_scheduler();
    let (preview, rx) = scheduler.open_preview();
    let source = png_source(30, 30);
    let mut params = CompositingParameters::default();
    let mut last = 0;
    for scale in [0.6, 0.7, 0.8] {
        params.scale = scale;
        last = preview
            .update(Some(ImageId::new("b")), Some(source.clone()), &params)
            .unwrap();
    }
    assert_eq!(last, 3);

    let events = wait_for_tier(&rx, last, 2);
    let mut prev = (0u64, -1i64);
    for event in &events {
        let PreviewEvent::Displayed { generation, tier, .. } = event else {
            panic!("unexpected event {event:?}");
        };
        let cur = (*generation, *tier as i64);
        assert!(cur > prev, "{cur:?} after {prev:?}");
        prev = cur;
    }
}

#[test]
fn dropping_the_last_preview_tears_everything_down() {
    let scheduler = fast_scheduler();
    let (first, rx1) = scheduler.open_preview();
    let (second, _rx2) = scheduler.open_preview();
    assert_eq!(scheduler.spawn_count(), 1);

    let g = first
        .update(
            Some(ImageId::new("c")),
            Some(png_source(20, 20)),
            &CompositingParameters::default(),
        )
        .unwrap();
    wait_for_tier(&rx1, g, 2);
    assert_eq!(scheduler.registry().live_count(), 1);

    drop(first);
    assert_eq!(scheduler.registry().live_count(), 0);
    assert!(scheduler.is_active());

    drop(second);
    assert!(!scheduler.is_active());
    assert_eq!(scheduler.pending_len(), 0);
}

#[test]
fn unsupported_context_reports_once_per_preview() {
    let scheduler = PreviewScheduler::new(SchedulerOptions {
        context: ContextOptions {
            offthread_enabled: false,
            ..ContextOptions::default()
        },
        ..SchedulerOptions::default()
    })
    .unwrap();
    let (preview, rx) = scheduler.open_preview();
    assert!(!preview.is_supported());
    assert!(matches!(rx.try_recv(), Ok(PreviewEvent::Unsupported { .. })));

    let err = preview
        .update(None, Some(png_source(4, 4)), &CompositingParameters::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContextUnavailable);
    assert!(rx.try_recv().is_err());
}

#[test]
fn persistent_failure_surfaces_a_single_message() {
    let scheduler = fast_scheduler();
    let (preview, rx) = scheduler.open_preview();
    let g = preview
        .update(
            None,
            Some(ImageSource::from_bytes(vec![0u8; 16])),
            &CompositingParameters::default(),
        )
        .unwrap();

    match rx.recv_timeout(WAIT).unwrap() {
        PreviewEvent::Failed { generation, message } => {
            assert_eq!(generation, g);
            assert!(message.starts_with("couldn't render preview"), "{message}");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(preview.phase(), PreviewPhase::Awaiting { tier: 2 });
}

#[test]
fn invalid_parameters_are_rejected_before_any_work() {
    let scheduler = fast_scheduler();
    let (preview, rx) = scheduler.open_preview();
    let params = CompositingParameters {
        scale: 2.0,
        ..CompositingParameters::default()
    };
    let err = preview
        .update(None, Some(png_source(4, 4)), &params)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(preview.generation(), 0);
    assert!(rx.try_recv().is_err());
}

fn tiny_image() -> crate::encode::EncodedImage {
    crate::encode::EncodedImage {
        format: crate::encode::OutputFormat::Png,
        width: 1,
        height: 1,
        bytes: Arc::from(vec![0u8; 4]),
    }
}

fn bare_state(tiers: usize) -> SharedInstance {
    Arc::new(Mutex::new(InstanceState {
        gate: QualityGate::new(tiers),
        active: None,
        timers: Vec::new(),
        requests: Vec::new(),
        closed: false,
    }))
}

#[test]
fn late_lower_tier_is_revoked_on_arrival() {
    let state = bare_state(3);
    let generation = lock(&state).gate.begin_generation();
    let registry = HandleRegistry::new();
    let (tx, rx) = crossbeam_channel::unbounded();
    let weak = Arc::downgrade(&state);

    let h1 = registry.create(tiny_image());
    let h0 = registry.create(tiny_image());
    let h2 = registry.create(tiny_image());

    accept(&weak, &tx, &registry, generation, 1, h1.clone());
    accept(&weak, &tx, &registry, generation, 0, h0.clone());
    assert!(registry.resolve(&h0).is_none());
    assert!(registry.resolve(&h1).is_some());

    accept(&weak, &tx, &registry, generation, 2, h2.clone());
    assert!(registry.resolve(&h1).is_none());

    let shown: Vec<(usize, DisplayHandle)> = rx
        .try_iter()
        .map(|e| match e {
            PreviewEvent::Displayed { tier, handle, .. } => (tier, handle),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(shown, [(1, h1), (2, h2.clone())]);
    assert_eq!(lock(&state).active.as_ref(), Some(&h2));
    assert_eq!(registry.live_count(), 1);
}

#[test]
fn results_for_a_closed_or_dropped_preview_are_revoked() {
    let registry = HandleRegistry::new();
    let (tx, rx) = crossbeam_channel::unbounded();

    let state = bare_state(1);
    let generation = lock(&state).gate.begin_generation();
    lock(&state).closed = true;
    let h = registry.create(tiny_image());
    accept(&Arc::downgrade(&state), &tx, &registry, generation, 0, h.clone());
    assert!(registry.resolve(&h).is_none());

    let weak = Arc::downgrade(&bare_state(1));
    let h = registry.create(tiny_image());
    accept(&weak, &tx, &registry, 1, 0, h.clone());
    assert!(registry.resolve(&h).is_none());

    assert!(rx.try_recv().is_err());
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn higher_tier_failure_after_a_display_is_reported_per_tier() {
    let state = bare_state(3);
    let generation = lock(&state).gate.begin_generation();
    let registry = HandleRegistry::new();
    let (tx, rx) = crossbeam_channel::unbounded();
    let err = StoryError::validation("canvas too large");

    // Nothing on display yet: a single tier failure stays quiet.
    fail(&mut lock(&state), &tx, generation, 1, &err);
    assert!(rx.try_recv().is_err());

    let h0 = registry.create(tiny_image());
    accept(&Arc::downgrade(&state), &tx, &registry, generation, 0, h0.clone());
    assert!(matches!(rx.try_recv(), Ok(PreviewEvent::Displayed { tier: 0, .. })));

    fail(&mut lock(&state), &tx, generation, 2, &err);
    match rx.try_recv() {
        Ok(PreviewEvent::TierFailed { generation: g, tier, error }) => {
            assert_eq!((g, tier), (generation, 2));
            assert!(error.contains("canvas too large"), "{error}");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(rx.try_recv().is_err());
    assert_eq!(lock(&state).active.as_ref(), Some(&h0));
    assert_eq!(registry.live_count(), 1);
}
