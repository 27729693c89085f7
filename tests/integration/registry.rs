//! Engine registry changes racing against the control thread
//!
//! Engines are added and removed from another thread while labels are being
//! ticked; readiness must always match the registry contents.

use crate::helpers::*;
use parlo::prelude::*;
use std::collections::HashMap;
use std::thread;

#[test]
fn test_concurrent_add_remove_during_ticks() {
    init_tracing();
    let (synth, mut driver, _) = test_synthesizer();
    let registry = synth.registry().clone();
    let labels_in = synth.label_sender();

    let mutator = thread::spawn({
        let registry = registry.clone();
        move || {
            for i in 0..200 {
                let name = if i % 2 == 0 { "A" } else { "B" };
                registry.add(name, fixed_engine());
                registry.with(|r| assert_eq!(r.is_ready(), !r.is_empty()));
                if i % 3 == 0 {
                    registry.remove("A");
                }
                if i % 5 == 0 {
                    registry.remove("B");
                }
                registry.with(|r| {
                    assert_eq!(r.is_ready(), !r.is_empty());
                    assert_eq!(r.default_name().is_some(), !r.is_empty());
                });
            }
        }
    });

    let feeder = thread::spawn(move || {
        for label in labels(100) {
            while labels_in.push(label.clone()).is_err() {
                thread::yield_now();
            }
        }
    });

    let mut buffer = [0.0f32; 256];
    while !(mutator.is_finished() && feeder.is_finished()) {
        driver.fill(&mut buffer);
    }
    mutator.join().unwrap();
    feeder.join().unwrap();

    assert!(synth.is_running());
    assert_eq!(registry.is_ready(), !registry.is_empty());
    registry.with(|r| {
        if let Some(name) = r.default_name() {
            assert!(r.contains(name));
        }
    });
}

#[test]
fn test_remove_default_hands_over_to_next() {
    let (synth, _driver, _) = test_synthesizer();
    assert_eq!(synth.add_engine("A", fixed_engine()), AddOutcome::AddedAsDefault);
    assert_eq!(synth.add_engine("B", fixed_engine()), AddOutcome::Added);
    assert_eq!(synth.add_engine("A", fixed_engine()), AddOutcome::AlreadyExists);

    assert!(synth.remove_engine("A"));
    assert_eq!(synth.default_engine().as_deref(), Some("B"));
    assert!(synth.is_ready());

    assert!(synth.remove_engine("B"));
    assert_eq!(synth.default_engine(), None);
    assert!(!synth.is_ready());
}

#[test]
fn test_interpolation_weights_from_another_thread() {
    let (synth, driver, _) = test_synthesizer();
    synth.add_engine("A", fixed_engine());
    synth.add_engine("B", fixed_engine());
    synth.set_interpolation(true).unwrap();

    let registry = synth.registry().clone();
    thread::spawn(move || {
        let weights = HashMap::from([
            ("A".to_string(), InterpolationWeights::uniform(1.0)),
            ("B".to_string(), InterpolationWeights::uniform(3.0)),
        ]);
        assert_eq!(registry.set_weights(&weights), 2);
    })
    .join()
    .unwrap();

    let a = synth.registry().weights("A").unwrap();
    let b = synth.registry().weights("B").unwrap();
    for (wa, wb) in a.iter().zip(b.iter()) {
        assert!((wa + wb - 1.0).abs() < 1e-9);
        assert!((wb - 0.75).abs() < 1e-9);
    }

    for label in labels(3) {
        synth.push_label(label).unwrap();
    }
    assert!(wait_until(|| driver.pending_frames() >= 2 * FRAMES_PER_LABEL));
}
