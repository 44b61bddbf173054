use connectome_cache::{RingCallbacks, RingOptions, SettleScheduler, SlidingRing};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks which positions are materialized and which one is selected, and
/// asserts the callback ordering contract on every call.
#[derive(Default)]
struct LiveSet {
    live: BTreeSet<i64>,
    selected: Option<i64>,
    pushes: usize,
    evictions: usize,
}

impl RingCallbacks<i64> for LiveSet {
    fn on_push(&mut self, n: i64) -> i64 {
        assert!(self.live.insert(n), "{} pushed twice", n);
        self.pushes += 1;
        n * 10
    }

    fn on_selected(&mut self, n: i64, obj: &i64) {
        assert!(self.live.contains(&n), "{} selected before push", n);
        assert_eq!(*obj, n * 10);
        assert!(self.selected.is_none(), "two positions selected");
        self.selected = Some(n);
    }

    fn on_unselected(&mut self, n: i64, _obj: &i64) {
        assert_eq!(self.selected, Some(n));
        self.selected = None;
    }

    fn on_evict(&mut self, n: i64, obj: i64) {
        assert_ne!(self.selected, Some(n), "{} evicted while selected", n);
        assert!(self.live.remove(&n), "{} evicted but not live", n);
        assert_eq!(obj, n * 10);
        self.evictions += 1;
    }
}

fn check_window(ring: &SlidingRing<i64, LiveSet>) {
    let (min, max) = ring.extent();
    let held = ring.held_positions();
    assert_eq!(held.len(), ring.capacity());
    assert!(held.windows(2).all(|w| w[1] == w[0] + 1), "window not contiguous: {:?}", held);
    assert!(held[0] >= min && held[held.len() - 1] <= max);
    assert!(held.contains(&ring.selected()));
    assert_eq!(ring.callbacks().selected, Some(ring.selected()));
    let live: Vec<i64> = ring.callbacks().live.iter().copied().collect();
    assert_eq!(live, held);
}

#[test]
fn random_walks_keep_window_contiguous() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for _ in 0..50 {
        let min = rng.i64(-20..20);
        let max = min + rng.i64(3..60);
        let capacity = rng.usize(3..12);
        let start_at = rng.i64(min..=max);

        let mut ring = SlidingRing::new(
            RingOptions {
                capacity,
                extent: (min, max),
                start_at,
            },
            LiveSet::default(),
        )
        .unwrap();
        check_window(&ring);

        for _ in 0..200 {
            let before = ring.selected();
            match rng.u8(0..10) {
                0 => {
                    let target = rng.i64(min..=max);
                    ring.goto(target).unwrap();
                    assert_eq!(ring.selected(), target);
                }
                1..=4 => {
                    let moved = ring.prev();
                    assert_eq!(moved, before > min);
                    if moved {
                        assert_eq!(ring.selected(), before - 1);
                    }
                }
                _ => {
                    let moved = ring.next();
                    assert_eq!(moved, before < max);
                    if moved {
                        assert_eq!(ring.selected(), before + 1);
                    }
                }
            }
            check_window(&ring);

            let stats = ring.callbacks();
            assert_eq!(stats.pushes - stats.evictions, ring.capacity());
        }
    }
}

#[test]
fn drop_releases_every_slot() {
    struct Counting(Arc<AtomicUsize>, Arc<AtomicUsize>);

    impl RingCallbacks<()> for Counting {
        fn on_push(&mut self, _n: i64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn on_selected(&mut self, _n: i64, _obj: &()) {}
        fn on_unselected(&mut self, _n: i64, _obj: &()) {}
        fn on_evict(&mut self, _n: i64, _obj: ()) {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    let pushes = Arc::new(AtomicUsize::new(0));
    let evictions = Arc::new(AtomicUsize::new(0));
    {
        let mut ring = SlidingRing::new(
            RingOptions {
                capacity: 7,
                extent: (0, 714),
                start_at: 537,
            },
            Counting(Arc::clone(&pushes), Arc::clone(&evictions)),
        )
        .unwrap();
        for _ in 0..30 {
            ring.next();
        }
        ring.goto(12).unwrap();
        ring.prev();
    }
    assert!(pushes.load(Ordering::SeqCst) > 7);
    assert_eq!(pushes.load(Ordering::SeqCst), evictions.load(Ordering::SeqCst));
}

#[test]
fn settle_runs_once_after_scrolling_stops() {
    tokio_test::block_on(async {
        let settled = Arc::new(AtomicUsize::new(0));
        let mut scheduler = SettleScheduler::from_millis(15);
        let mut ring = SlidingRing::new(
            RingOptions {
                capacity: 5,
                extent: (0, 714),
                start_at: 537,
            },
            LiveSet::default(),
        )
        .unwrap();

        for _ in 0..10 {
            ring.next();
            let settled = Arc::clone(&settled);
            scheduler
                .schedule(move || {
                    settled.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(settled.load(Ordering::SeqCst), 1);
        assert_eq!(ring.selected(), 547);
    });
}
