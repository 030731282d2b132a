//! Sensor line decoding.
//!
//! The sensor prints one human-readable line per measurement, for example
//! `VOC: 450, 甲醛: 80, PM2.5: 60`. Only the three labelled integers matter;
//! anything around or between them is ignored.

use std::sync::LazyLock;

use regex::Regex;

use super::sample::Readings;

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"VOC: ([0-9]+).*?甲醛: ([0-9]+).*?PM2\.5: ([0-9]+)").expect("sensor line regex")
});

/// Extract the VOC, formaldehyde and PM2.5 readings from a sensor line.
///
/// Returns `None` unless all three labelled integers are present in that
/// order. A value too large for `u32` also rejects the whole line.
pub fn decode_line(line: &str) -> Option<Readings> {
    let caps = LINE_RE.captures(line)?;
    let field = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    Some(Readings::new(field(1)?, field(2)?, field(3)?))
}
