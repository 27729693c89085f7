//! Label to sample flow on a single thread
//!
//! Drives a `SynthesisController` built by the umbrella builder through ticks
//! and sample advances, checking what reaches the vocoder.

use crate::helpers::*;
use approx::assert_relative_eq;
use parlo::prelude::*;
use parlo::NUM_STATES;

#[test]
fn test_labels_become_frames_at_hop_rate() {
    let (mut controller, record) = test_controller();
    for label in labels(3) {
        controller.push_label(label).unwrap();
    }

    assert_eq!(controller.tick().unwrap(), TickOutcome::Buffered);
    assert_eq!(
        controller.tick().unwrap(),
        TickOutcome::Processed {
            frames_emitted: FRAMES_PER_LABEL,
            window: 0
        }
    );
    assert_eq!(
        controller.tick().unwrap(),
        TickOutcome::Processed {
            frames_emitted: FRAMES_PER_LABEL,
            window: 1
        }
    );
    assert_eq!(controller.driver().pending_frames(), 2 * FRAMES_PER_LABEL);

    let mut buffer = vec![0.0f32; 2 * FRAMES_PER_LABEL * TEST_HOP_LENGTH as usize];
    controller.fill(&mut buffer);

    assert_eq!(record.frames_pushed(), 2 * FRAMES_PER_LABEL);
    assert_eq!(controller.driver().pending_frames(), 0);
    // Silence until the first frame is pulled on the fourth sample.
    assert!(buffer[..3].iter().all(|&s| s == 0.0));
    assert_relative_eq!(buffer[3], (0.5 * 1000.0 / 32768.0) as f32);
}

#[test]
fn test_frames_carry_engine_parameters() {
    let (mut controller, record) = test_controller();
    for label in labels(2) {
        controller.push_label(label).unwrap();
        controller.tick().unwrap();
    }
    let mut buffer = vec![0.0f32; FRAMES_PER_LABEL * TEST_HOP_LENGTH as usize];
    controller.fill(&mut buffer);

    let frames = record.frames();
    assert_eq!(frames.len(), FRAMES_PER_LABEL);
    for frame in &frames {
        assert!(frame.voiced);
        assert_eq!(frame.mgc.len(), 4);
        assert_relative_eq!(frame.mgc[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(frame.lf0, 5.0, epsilon = 1e-9);
        assert_relative_eq!(frame.f0(), 5.0f64.exp(), epsilon = 1e-6);
    }
}

#[test]
fn test_hop_length_change_slows_frame_pulls() {
    let (mut controller, record) = test_controller();
    for label in labels(2) {
        controller.push_label(label).unwrap();
        controller.tick().unwrap();
    }

    assert_eq!(controller.set_speed(2.0, Action::Scale), 2.0 * TEST_HOP_LENGTH);
    let mut buffer = vec![0.0f32; 10 * 2 * TEST_HOP_LENGTH as usize];
    controller.fill(&mut buffer);
    assert_eq!(record.frames_pushed(), 10);
}

#[test]
fn test_duration_override_applies_to_next_label_only() {
    let (mut controller, _) = test_controller();
    controller.set_duration([1.0; NUM_STATES], Action::Shift);

    controller.push_label(Label::new("a")).unwrap();
    controller.tick().unwrap();
    assert_eq!(controller.duration(), 20);

    controller.push_label(Label::new("b")).unwrap();
    controller.tick().unwrap();
    assert_eq!(controller.duration(), FRAMES_PER_LABEL);
}

#[test]
fn test_label_speed_shortens_models() {
    let (mut controller, _) = test_controller();
    controller.set_label_speed(3.0);
    controller.push_label(Label::new("a")).unwrap();
    controller.tick().unwrap();
    assert_eq!(controller.duration(), 5);
}

#[test]
fn test_teardown_reports_everything_released() {
    let (mut controller, record) = test_controller();
    for label in labels(5) {
        controller.push_label(label).unwrap();
    }
    for _ in 0..4 {
        controller.tick().unwrap();
    }

    let report = controller.teardown();
    assert_eq!(report.labels_dropped, 1);
    assert_eq!(report.models_dropped, 3);
    assert_eq!(report.frames_dropped, 3 * FRAMES_PER_LABEL);
    assert_eq!(report.engines_released, 1);
    assert_eq!(record.resets(), 1);
}

#[test]
fn test_default_vocoder_produces_bounded_audio() {
    let mut controller = Synthesizer::builder()
        .config(test_config())
        .engine("slt", fixed_engine())
        .build_controller()
        .unwrap();
    for label in labels(3) {
        controller.push_label(label).unwrap();
        controller.tick().unwrap();
    }

    let mut buffer = vec![0.0f32; 2 * FRAMES_PER_LABEL * TEST_HOP_LENGTH as usize];
    controller.fill(&mut buffer);
    assert!(buffer.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    assert!(buffer.iter().any(|&s| s != 0.0));
}

#[test]
fn test_oversized_duration_request_is_bounded() {
    let (mut controller, _) = test_controller();
    controller.set_duration([1.0e20; NUM_STATES], Action::Overwrite);
    controller.push_label(Label::new("a")).unwrap();

    assert_eq!(controller.tick().unwrap(), TickOutcome::Buffered);
    let max = controller.pipeline().config().max_state_frames;
    assert_eq!(controller.duration(), NUM_STATES * max);
}
