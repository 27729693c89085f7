//! Engine configuration boundary.
//!
//! An engine configuration file is a whitespace-separated argument list, the
//! same tokens a command line would carry (`-m voice.htsvoice -s 48000 ...`).
//! Interpreting the tokens is the loader's business.

use crate::config::ArgLimits;
use crate::engine::AcousticEngine;
use crate::{Error, Result};
use std::path::Path;

/// Bounded list of engine arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineArgs {
    args: Vec<String>,
}

impl EngineArgs {
    /// Tokenize `source` on whitespace, enforcing `limits`.
    pub fn parse(source: &str, limits: &ArgLimits) -> Result<Self> {
        let mut args = Vec::new();
        for token in source.split_whitespace() {
            if token.len() > limits.max_argument_len {
                return Err(Error::Config(format!(
                    "argument of {} bytes exceeds the {} byte limit",
                    token.len(),
                    limits.max_argument_len
                )));
            }
            if args.len() == limits.max_arguments {
                return Err(Error::Config(format!(
                    "more than {} arguments",
                    limits.max_arguments
                )));
            }
            args.push(token.to_string());
        }
        Ok(Self { args })
    }

    pub fn from_file(path: &Path, limits: &ArgLimits) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source, limits)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Value following `flag`, e.g. `value_of("-m")`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }
}

impl<S: Into<String>> FromIterator<S> for EngineArgs {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Builds an acoustic engine from its argument list.
pub trait EngineLoader {
    fn load(&self, args: &EngineArgs) -> Result<Box<dyn AcousticEngine>>;
}

impl<F> EngineLoader for F
where
    F: Fn(&EngineArgs) -> Result<Box<dyn AcousticEngine>>,
{
    fn load(&self, args: &EngineArgs) -> Result<Box<dyn AcousticEngine>> {
        self(args)
    }
}
