//! Configuration boundary: TOML config files and engine argument files

use crate::helpers::*;
use parlo::prelude::*;
use parlo_core::testing::FixedEngine;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Loader reading the mean state duration from `-d`.
fn duration_loader(args: &EngineArgs) -> parlo_core::Result<Box<dyn AcousticEngine>> {
    let duration = args
        .value_of("-d")
        .ok_or_else(|| parlo_core::Error::Config("missing -d".into()))?
        .parse::<f64>()
        .map_err(|e| parlo_core::Error::Config(e.to_string()))?;
    Ok(Box::new(FixedEngine::default().with_duration_mean(duration)))
}

#[test]
fn test_builder_reads_toml_config() {
    let file = write_file(
        "lookahead = 2\n\
         backup = 1\n\
         default_hop_length = 80.0\n\
         \n\
         [args]\n\
         max_arguments = 8\n",
    );
    let controller = Synthesizer::builder()
        .config_file(file.path())
        .unwrap()
        .build_controller()
        .unwrap();

    let config = controller.pipeline().config();
    assert_eq!(config.lookahead, 2);
    assert_eq!(config.backup, 1);
    assert_eq!(config.args.max_arguments, 8);
    assert_eq!(controller.hop_length(), 80.0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let file = write_file("model_queue_capacity = 2\nlookahead = 1\nbackup = 2\n");
    let result = Synthesizer::builder().config_file(file.path());
    assert!(matches!(
        result,
        Err(Error::Core(parlo_core::Error::InvalidConfig(_)))
    ));

    let file = write_file("lookahead = \"one\"\n");
    assert!(matches!(
        Synthesizer::builder().config_file(file.path()),
        Err(Error::Core(parlo_core::Error::Toml(_)))
    ));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Synthesizer::builder().config_file(dir.path().join("missing.toml")),
        Err(Error::Core(parlo_core::Error::Io(_)))
    ));
}

#[test]
fn test_engine_from_argument_file() {
    let (mut controller, _) = test_controller();
    let file = write_file("-m voices/slt.htsvoice\n-d 2\n");

    let outcome = controller
        .add_engine_from_file("fast", file.path(), &duration_loader)
        .unwrap();
    assert_eq!(outcome, AddOutcome::Added);
    assert!(controller.set_default_engine("fast"));

    controller.push_label(Label::new("a")).unwrap();
    controller.tick().unwrap();
    assert_eq!(controller.duration(), 10);
}

#[test]
fn test_failed_engine_load_leaves_registry_untouched() {
    let (controller, _) = test_controller();
    let names = controller.pipeline().registry().names();

    let file = write_file("-m voices/slt.htsvoice\n");
    assert!(matches!(
        controller.add_engine_from_file("broken", file.path(), &duration_loader),
        Err(parlo_core::Error::EngineLoad { .. })
    ));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        controller.add_engine_from_file("gone", dir.path().join("none.cfg"), &duration_loader),
        Err(parlo_core::Error::Io(_))
    ));

    let too_many = write_file(&"-x ".repeat(60));
    assert!(matches!(
        controller.add_engine_from_file("long", too_many.path(), &duration_loader),
        Err(parlo_core::Error::Config(_))
    ));

    assert_eq!(controller.pipeline().registry().names(), names);
    assert!(controller.is_ready());
}
