//! Threaded synthesizer lifecycle and live controls
//!
//! The control thread ticks on its own; tests wait on the frame queue and use
//! request/response commands (`set_speed`, `duration`) as sync points.

use crate::helpers::*;
use parlo::prelude::*;

#[test]
fn test_control_thread_generates_frames() {
    init_tracing();
    let (mut synth, mut driver, record) = test_synthesizer();
    synth.add_engine("slt", fixed_engine());
    assert!(synth.is_running());

    for label in labels(5) {
        synth.push_label(label).unwrap();
    }
    // Lookahead 1: every label but the last is generated.
    assert!(wait_until(|| driver.pending_frames() >= 4 * FRAMES_PER_LABEL));
    assert_eq!(synth.duration().unwrap(), FRAMES_PER_LABEL);

    let mut buffer = vec![0.0f32; 4 * FRAMES_PER_LABEL * TEST_HOP_LENGTH as usize];
    driver.fill(&mut buffer);
    assert_eq!(record.frames_pushed(), 4 * FRAMES_PER_LABEL);

    let report = synth.shutdown().unwrap();
    assert_eq!(report.labels_dropped, 0);
    assert_eq!(report.models_dropped, 3);
    assert_eq!(report.engines_released, 1);
    assert!(!synth.is_running());
    assert!(!synth.is_ready());
}

#[test]
fn test_labels_wait_for_an_engine() {
    let (synth, driver, _) = test_synthesizer();
    for label in labels(3) {
        synth.push_label(label).unwrap();
    }
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(driver.pending_frames(), 0);
    assert!(!synth.is_ready());

    assert_eq!(synth.add_engine("slt", fixed_engine()), AddOutcome::AddedAsDefault);
    assert!(wait_until(|| driver.pending_frames() >= 2 * FRAMES_PER_LABEL));
}

#[test]
fn test_set_speed_round_trip() {
    let (synth, driver, _) = test_synthesizer();
    assert_eq!(synth.hop_length(), TEST_HOP_LENGTH);

    assert_eq!(synth.set_speed(5.0, Action::Shift).unwrap(), TEST_HOP_LENGTH + 5.0);
    assert_eq!(driver.hop_length(), TEST_HOP_LENGTH + 5.0);

    let max = TEST_HOP_LENGTH * parlo::core::MAX_HOP_FACTOR;
    assert_eq!(synth.set_speed(1.0e9, Action::Overwrite).unwrap(), max);
    assert_eq!(synth.set_speed(-3.0, Action::Overwrite).unwrap(), 1.0);
    assert_eq!(synth.set_speed(7.0, Action::Synthetic).unwrap(), TEST_HOP_LENGTH);
}

#[test]
fn test_reset_restores_controls() {
    let (synth, mut driver, record) = test_synthesizer();
    synth.set_speed(40.0, Action::Overwrite).unwrap();
    synth.set_label_speed(2.0).unwrap();
    synth.set_interpolation(true).unwrap();
    synth.reset().unwrap();
    // Commands are handled in order, so this returns after the reset.
    synth.duration().unwrap();

    assert_eq!(synth.hop_length(), TEST_HOP_LENGTH);
    driver.apply_commands();
    assert_eq!(record.resets(), 1);
    assert_eq!(driver.sample_count(), 0);
}

#[test]
fn test_vocoder_controls_reach_audio_side() {
    let (synth, mut driver, _) = test_synthesizer();
    synth.set_alpha(0.42).unwrap();
    synth.set_volume(0.5).unwrap();
    synth.set_pitch(2.0, Action::Scale).unwrap();
    driver.apply_commands();

    assert_eq!(driver.vocoder().alpha(), 0.42);
    assert_eq!(driver.vocoder().volume(), 0.5);
    assert_eq!(driver.vocoder().controls().pitch_action, Action::Scale);
}

#[test]
fn test_commands_fail_after_shutdown() {
    let (mut synth, _driver, _) = test_synthesizer();
    synth.shutdown().unwrap();

    assert!(matches!(
        synth.set_label_speed(2.0),
        Err(Error::ControlThreadDisconnected)
    ));
    assert!(matches!(
        synth.shutdown(),
        Err(Error::ControlThreadDisconnected)
    ));
}

#[test]
fn test_drop_stops_control_thread() {
    let (synth, _driver, _) = test_synthesizer();
    synth.add_engine("slt", fixed_engine());
    let labels_in = synth.label_sender();
    drop(synth);

    // The label queue receiver went down with the pipeline.
    assert!(matches!(
        labels_in.push(Label::new("late")),
        Err(parlo::core::Error::LabelQueueClosed { .. })
    ));
}

#[test]
fn test_backlog_larger_than_frame_queue_loses_no_frames() {
    let (vocoder, record) = parlo_core::testing::RecordingVocoder::new(1000.0);
    let (mut synth, mut driver) = Synthesizer::builder()
        .config(SynthesisConfig {
            frame_queue_capacity: 64,
            ..test_config()
        })
        .vocoder(Box::new(vocoder))
        .engine("slt", fixed_engine())
        .build()
        .unwrap();

    let label_count = 40;
    for label in labels(label_count) {
        synth.push_label(label).unwrap();
    }
    // Without a consumer the control thread stalls on the full frame queue.
    assert!(wait_until(|| driver.pending_frames() > 64 - FRAMES_PER_LABEL));
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert!(driver.pending_frames() <= 64);

    let expected = (label_count - 1) * FRAMES_PER_LABEL;
    let mut buffer = [0.0f32; 64];
    assert!(wait_until(|| {
        driver.fill(&mut buffer);
        record.frames_pushed() >= expected
    }));
    // Flush whatever is still queued, then check nothing extra appears.
    for _ in 0..8 {
        driver.fill(&mut buffer);
    }
    assert_eq!(record.frames_pushed(), expected);

    let report = synth.shutdown().unwrap();
    assert_eq!(report.labels_dropped, 0);
}
