//! Linguistic labels produced by the front-end.

use crate::{Error, Result};

/// HTS label times are expressed in units of 100 ns.
const LABEL_TIME_UNIT_SECS: f64 = 1e-7;

/// One linguistic unit (usually a phoneme in full context).
///
/// Produced by the front-end; the controller copies it into its current-label
/// slot on dequeue, where only the speed is adjusted.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    context: String,
    speed: f64,
    begin: Option<u64>,
    end: Option<u64>,
}

impl Label {
    /// Label with a full-context query string and unit speed.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            speed: 1.0,
            begin: None,
            end: None,
        }
    }

    /// Parse one line of an HTS label file.
    ///
    /// Accepts `"<begin> <end> <context>"` (times in 100 ns units) or a bare
    /// `"<context>"`.
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let first = tokens
            .next()
            .ok_or_else(|| Error::InvalidLabel("empty label line".to_string()))?;

        match (tokens.next(), tokens.next()) {
            (None, _) => Ok(Self::new(first)),
            (Some(second), Some(context)) => {
                if tokens.next().is_some() {
                    return Err(Error::InvalidLabel(format!("trailing tokens in '{line}'")));
                }
                let begin = parse_time(first, line)?;
                let end = parse_time(second, line)?;
                if end < begin {
                    return Err(Error::InvalidLabel(format!("end before begin in '{line}'")));
                }
                Ok(Self::new(context).with_times(begin, end))
            }
            (Some(_), None) => Err(Error::InvalidLabel(format!(
                "expected '<begin> <end> <context>' or '<context>', got '{line}'"
            ))),
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_times(mut self, begin: u64, end: u64) -> Self {
        self.begin = Some(begin);
        self.end = Some(end);
        self
    }

    /// Full-context query used for model lookup.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Text for log messages.
    pub fn query(&self) -> &str {
        &self.context
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Duration imposed by the label times, if both are present and non-empty.
    pub fn forced_duration_secs(&self) -> Option<f64> {
        match (self.begin, self.end) {
            (Some(begin), Some(end)) if end > begin => {
                Some((end - begin) as f64 * LABEL_TIME_UNIT_SECS)
            }
            _ => None,
        }
    }
}

impl Default for Label {
    /// Silence placeholder held by the controller before the first dequeue.
    fn default() -> Self {
        Self::new("x^x-pau+x=x")
    }
}

fn parse_time(token: &str, line: &str) -> Result<u64> {
    token
        .parse()
        .map_err(|_| Error::InvalidLabel(format!("bad time '{token}' in '{line}'")))
}
