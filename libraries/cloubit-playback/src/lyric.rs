//! Lyric data and LRC timing lookup
//!
//! Only the parsed shape lives here; rendering belongs to the UI.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lyric bundle for one track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyric {
    /// Original LRC text (`[mm:ss.xx]line` per row)
    #[serde(default)]
    pub lrc: String,

    /// Translated LRC text, if the service has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// Which lyric text to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LyricKind {
    #[default]
    Original,
    Translated,
}

/// One timed lyric line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub time: Duration,
    pub text: String,
}

impl Lyric {
    pub fn new(lrc: impl Into<String>) -> Self {
        Self {
            lrc: lrc.into(),
            translation: None,
        }
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Raw text for `kind`; a missing translation falls back to the original
    pub fn text(&self, kind: LyricKind) -> &str {
        match (kind, self.translation.as_deref()) {
            (LyricKind::Translated, Some(translation)) if !translation.is_empty() => translation,
            _ => &self.lrc,
        }
    }

    /// Line being sung at `position`, or `""` before the first timed line
    pub fn line_at(&self, kind: LyricKind, position: Duration) -> String {
        line_at(&parse_lrc(self.text(kind)), position)
            .unwrap_or_default()
            .to_string()
    }
}

/// Parse LRC text into time-ordered lines
///
/// Each row may carry one `[mm:ss.f]` tag anywhere in it. A 3-digit fraction
/// is milliseconds, anything else is read as hundredths. Rows without a tag
/// or with empty text are skipped; a later row with the same time replaces
/// an earlier one.
pub fn parse_lrc(input: &str) -> Vec<LyricLine> {
    let mut lines: Vec<LyricLine> = Vec::new();

    for row in input.lines() {
        let Some((time, text)) = parse_row(row) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        match lines.binary_search_by_key(&time, |line| line.time) {
            Ok(existing) => lines[existing].text = text,
            Err(insert_at) => lines.insert(insert_at, LyricLine { time, text }),
        }
    }

    lines
}

/// Last line whose time is at or before `position`
pub fn line_at(lines: &[LyricLine], position: Duration) -> Option<&str> {
    lines
        .iter()
        .take_while(|line| line.time <= position)
        .last()
        .map(|line| line.text.as_str())
}

fn parse_row(row: &str) -> Option<(Duration, String)> {
    let mut search_from = 0;
    while let Some(offset) = row[search_from..].find('[') {
        let open = search_from + offset;
        if let Some((time, tag_len)) = parse_tag(&row[open..]) {
            let text = format!("{}{}", &row[..open], &row[open + tag_len..]);
            return Some((time, text.trim().to_string()));
        }
        search_from = open + 1;
    }
    None
}

/// Parse `[mm:ss.f+]` at the start of `input`, returning the time and tag length
fn parse_tag(input: &str) -> Option<(Duration, usize)> {
    let close = input.find(']')?;
    let body = &input[1..close];

    let (minutes, rest) = body.split_once(':')?;
    let (seconds, fraction) = rest.split_once('.')?;
    if minutes.len() != 2 || seconds.len() != 2 || fraction.is_empty() {
        return None;
    }
    if ![minutes, seconds, fraction]
        .iter()
        .all(|part| part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    let fraction_value: u64 = fraction.parse().ok()?;
    let fraction_ms = if fraction.len() == 3 {
        fraction_value
    } else {
        fraction_value.saturating_mul(10)
    };

    let time = Duration::from_secs(minutes * 60 + seconds) + Duration::from_millis(fraction_ms);
    Some((time, close + 1))
}
