//! Property-based tests for the reconciler
//!
//! Each property drives a fresh reconciler with generated observation
//! sequences and checks the emitted event stream against a simple model.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

use btdj_state::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

const DEVICE: &str = "AA:BB:CC:DD:EE:FF";

fn new_reconciler() -> Reconciler {
    Reconciler::new(
        DeviceStore::new(),
        Arc::new(EventBus::new(1024)),
        ReconcilerConfig::default(),
    )
    .unwrap()
}

fn device() -> DeviceId {
    DeviceId::new(DEVICE)
}

fn track_changes(events: &[MonitorEvent]) -> Vec<TrackMetadata> {
    events
        .iter()
        .filter_map(|event| match event {
            MonitorEvent::TrackChanged { current, .. } => Some(current.clone()),
            _ => None,
        })
        .collect()
}

fn stopped_events(events: &[MonitorEvent]) -> usize {
    events
        .iter()
        .filter(|event| {
            matches!(
                event,
                MonitorEvent::PlaybackStateChanged {
                    current: PlaybackState::Stopped,
                    ..
                }
            )
        })
        .count()
}

/// Tracks from a small pool so repeats are common, placeholders included
fn track_strategy() -> impl Strategy<Value = TrackMetadata> {
    (
        prop::sample::select(vec!["Artist1", "Artist2", "unknown", " Artist1 ", ""]),
        prop::sample::select(vec!["Title1", "Title2", "Title3", "null"]),
        prop::option::of(prop::sample::select(vec!["Album1", "Album2"])),
        prop::option::of(1u64..600_000_000),
    )
        .prop_map(|(artist, title, album, duration)| {
            let mut track = TrackMetadata::new(artist, title);
            if let Some(album) = album {
                track = track.with_album(album);
            }
            if let Some(duration) = duration {
                track = track.with_duration_us(duration);
            }
            track
        })
}

fn source_strategy() -> impl Strategy<Value = SourceKind> {
    prop::sample::select(vec![SourceKind::Bus, SourceKind::Polling])
}

// ============================================================================
// Property 1: Track changes only on valid, unequal candidates
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The emitted track changes are exactly the valid candidates that differ
    /// from the previously accepted track.
    #[test]
    fn prop_track_changes_are_deduplicated(tracks in prop::collection::vec(track_strategy(), 1..40)) {
        let reconciler = new_reconciler();
        let now = Instant::now();
        let mut expected: Vec<TrackMetadata> = Vec::new();
        let mut events = Vec::new();

        for track in tracks {
            if track.is_valid() && expected.last() != Some(&track) {
                expected.push(track.clone());
            }
            let candidate = Candidate::new(Some(device()), SourceKind::Polling).with_track(track);
            events.extend(reconciler.apply(Observation::Candidate(candidate), now));
        }

        let changes = track_changes(&events);
        prop_assert_eq!(&changes, &expected);
        for pair in changes.windows(2) {
            prop_assert_ne!(&pair[0], &pair[1]);
        }
        prop_assert_eq!(reconciler.store().current_track(&device()), expected.last().cloned());
    }

    /// Repeating the same candidate never emits anything after the first time.
    #[test]
    fn prop_identical_candidates_are_idempotent(
        track in track_strategy(),
        repeats in 2usize..10,
    ) {
        let reconciler = new_reconciler();
        let now = Instant::now();
        let candidate = Candidate::new(Some(device()), SourceKind::Polling)
            .with_track(track)
            .with_state(PlaybackState::Playing);

        reconciler.apply(Observation::Candidate(candidate.clone()), now);
        for _ in 1..repeats {
            let events = reconciler.apply(Observation::Candidate(candidate.clone()), now);
            prop_assert!(events.is_empty());
        }
    }
}

// ============================================================================
// Property 2: Grace window on activity-only devices
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A gap shorter than the grace window never reports a stop; a gap that
    /// reaches it reports exactly one.
    #[test]
    fn prop_gap_vs_grace_window(gap_ms in 0u64..12_000) {
        let reconciler = new_reconciler();
        let grace = reconciler.config().grace_window;
        let gap = Duration::from_millis(gap_ms);
        let t0 = Instant::now();
        reconciler.apply(Observation::Devices(vec![DeviceInfo::new(DEVICE)]), t0);

        let mut events = reconciler.apply(
            Observation::Activity { device: Some(device()), active: true },
            t0,
        );
        events.extend(reconciler.apply(
            Observation::Activity { device: Some(device()), active: false },
            t0,
        ));

        let mut elapsed = Duration::ZERO;
        while elapsed < gap {
            events.extend(reconciler.tick(t0 + elapsed));
            elapsed += Duration::from_millis(500);
        }
        events.extend(reconciler.apply(
            Observation::Activity { device: Some(device()), active: true },
            t0 + gap,
        ));

        let expected = usize::from(gap > grace);
        prop_assert_eq!(stopped_events(&events), expected);
    }
}

// ============================================================================
// Property 3: Bus values outrank polling
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Once the bus has supplied a track, the stored track is always the last
    /// valid bus track regardless of interleaved polling candidates.
    #[test]
    fn prop_bus_outranks_polling(
        updates in prop::collection::vec((source_strategy(), track_strategy()), 1..40),
    ) {
        let reconciler = new_reconciler();
        let now = Instant::now();
        let mut last_bus: Option<TrackMetadata> = None;

        for (source, track) in updates {
            if source == SourceKind::Bus && track.is_valid() {
                last_bus = Some(track.clone());
            }
            let candidate = Candidate::new(Some(device()), source).with_track(track);
            reconciler.apply(Observation::Candidate(candidate), now);

            if let Some(expected) = &last_bus {
                let current = reconciler.store().current_track(&device());
                prop_assert_eq!(current.as_ref(), Some(expected));
            }
        }
    }
}

// ============================================================================
// Property 4: Disconnect clears state
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Reconnecting after a disconnect always starts from no track and
    /// `Unknown`, whatever was stored before.
    #[test]
    fn prop_reconnect_starts_clean(
        track in track_strategy(),
        state in prop::sample::select(vec![
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Stopped,
        ]),
        explicit in any::<bool>(),
    ) {
        let reconciler = new_reconciler();
        let now = Instant::now();
        let candidate = Candidate::new(Some(device()), SourceKind::Polling)
            .with_track(track)
            .with_state(state);
        reconciler.apply(Observation::Candidate(candidate), now);

        let disconnect = if explicit {
            Observation::Disconnected(device())
        } else {
            Observation::Devices(Vec::new())
        };
        let events = reconciler.apply(disconnect, now);
        prop_assert_eq!(events, vec![MonitorEvent::DeviceDisconnected { device: device() }]);

        reconciler.apply(Observation::Devices(vec![DeviceInfo::new(DEVICE)]), now);
        prop_assert_eq!(reconciler.store().current_track(&device()), None);
        prop_assert_eq!(reconciler.store().current_state(&device()), PlaybackState::Unknown);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_polling_metadata_scenario() {
    let bus = Arc::new(EventBus::new(16));
    let mut stream = bus.subscribe();
    let reconciler =
        Reconciler::new(DeviceStore::new(), bus, ReconcilerConfig::default()).unwrap();

    let candidate = Candidate::new(Some(DeviceId::new("AA:BB:CC:DD:EE:FF")), SourceKind::Polling)
        .with_track(TrackMetadata::new("Test Artist", "Test Song"));
    reconciler.apply(Observation::Candidate(candidate), Instant::now());

    let events = stream.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        MonitorEvent::TrackChanged {
            device: DeviceId::new("AA:BB:CC:DD:EE:FF"),
            current: TrackMetadata::new("Test Artist", "Test Song"),
            previous: None,
        }
    );

    let json = serde_json::to_value(&events[1]).unwrap();
    assert_eq!(json["type"], "TrackChanged");
    assert_eq!(json["current"]["artist"], "Test Artist");
    assert_eq!(json["current"]["title"], "Test Song");
    assert!(json["previous"].is_null());
}

#[test]
fn test_events_are_ordered_per_device() {
    let reconciler = new_reconciler();
    let now = Instant::now();

    let mut events = Vec::new();
    for (artist, state) in [
        ("Artist1", PlaybackState::Playing),
        ("Artist2", PlaybackState::Paused),
        ("Artist3", PlaybackState::Playing),
    ] {
        let candidate = Candidate::new(Some(device()), SourceKind::Polling)
            .with_track(TrackMetadata::new(artist, "Title"))
            .with_state(state);
        events.extend(reconciler.apply(Observation::Candidate(candidate), now));
    }

    let kinds: Vec<&str> = events.iter().map(MonitorEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "device_connected",
            "track_changed",
            "playback_state_changed",
            "track_changed",
            "playback_state_changed",
            "track_changed",
            "playback_state_changed",
        ]
    );
}

#[test]
fn test_current_device_promotion() {
    let reconciler = new_reconciler();
    let now = Instant::now();

    reconciler.apply(
        Observation::Devices(vec![
            DeviceInfo::named("11:11:11:11:11:11", "Phone"),
            DeviceInfo::named("22:22:22:22:22:22", "Tablet"),
        ]),
        now,
    );
    assert_eq!(
        reconciler.store().current_device(),
        Some(DeviceId::new("11:11:11:11:11:11"))
    );

    reconciler.apply(
        Observation::Disconnected(DeviceId::new("11:11:11:11:11:11")),
        now,
    );
    assert_eq!(
        reconciler.store().current_device(),
        Some(DeviceId::new("22:22:22:22:22:22"))
    );
    assert_eq!(reconciler.store().connected_devices().len(), 1);
}
