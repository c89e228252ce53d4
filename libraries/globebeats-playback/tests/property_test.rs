//! Property-based tests for the playback controller
//!
//! Random interleavings of play, resolve, stop and device signals must never leave
//! more than one device live, and must never leave a play request unresolved once
//! every device start has settled.

mod common;

use common::*;
use globebeats_playback::{
    DeviceSignal, InFlightPolicy, PlayOptions, PlayOutcome, PlaybackError, PlayerConfig,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    /// Spawn a play for track `n`; `manual` leaves its start pending
    Play { n: u8, manual: bool },
    /// Resolve the most recent pending start
    Resolve { ok: bool },
    Stop,
    Pause,
    Finish,
    Yield,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..4, any::<bool>()).prop_map(|(n, manual)| Op::Play { n, manual }),
        3 => any::<bool>().prop_map(|ok| Op::Resolve { ok }),
        1 => Just(Op::Stop),
        1 => Just(Op::Pause),
        1 => Just(Op::Finish),
        2 => Just(Op::Yield),
    ]
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn run(ops: Vec<Op>, in_flight: InFlightPolicy) -> std::result::Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let (backend, controller) = setup_with(PlayerConfig {
            in_flight,
            start_timeout_ms: None,
            ..PlayerConfig::default()
        });
        let mut tasks = Vec::new();

        for op in ops {
            match op {
                Op::Play { n, manual } => {
                    let name = format!("t{n}");
                    let mode = if manual {
                        StartMode::Manual
                    } else {
                        StartMode::Succeed
                    };
                    backend.set_mode(&uri(&name), mode);
                    let controller = controller.clone();
                    tasks.push(tokio::spawn(async move {
                        controller.play(track(&name), PlayOptions::new(TRENDING)).await
                    }));
                }
                Op::Resolve { ok } => {
                    let pending = backend.devices().into_iter().rev().find(|d| !d.is_released());
                    if let Some(device) = pending {
                        let result = if ok {
                            Ok(())
                        } else {
                            Err(PlaybackError::resource("scripted failure"))
                        };
                        device.resolve(result);
                    }
                }
                Op::Stop => controller.stop(),
                Op::Pause => controller.pause(),
                Op::Finish => {
                    if let Some(device) = backend.devices().last() {
                        device.emit(DeviceSignal::Ended);
                    }
                }
                Op::Yield => settle().await,
            }

            prop_assert!(backend.live_count() <= 1, "two devices live at once");
            prop_assert!(controller.live_device_count() <= 1);
        }

        // Let every pending start settle (spawned plays may still be attaching)
        while !tasks.iter().all(tokio::task::JoinHandle::is_finished) {
            for device in backend.devices() {
                device.resolve(Ok(()));
            }
            settle().await;
        }
        for task in tasks {
            let outcome = task.await.unwrap();
            if in_flight == InFlightPolicy::Supersede {
                prop_assert_ne!(outcome, PlayOutcome::Busy);
            }
        }

        let state = controller.get_state();
        prop_assert!(!state.is_loading);
        prop_assert_eq!(backend.live_count(), controller.live_device_count());
        if state.is_playing {
            prop_assert_eq!(backend.live_count(), 1);
        }
        if state.current_track.is_none() {
            prop_assert_eq!(backend.live_count(), 0);
        }
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_at_most_one_live_device_rejecting(ops in prop::collection::vec(op(), 1..40)) {
        run(ops, InFlightPolicy::RejectNew)?;
    }

    #[test]
    fn prop_at_most_one_live_device_superseding(ops in prop::collection::vec(op(), 1..40)) {
        run(ops, InFlightPolicy::Supersede)?;
    }
}
