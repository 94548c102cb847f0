//! Output representations derived from a [`Transcript`].
//!
//! Every formatter is a deterministic, side-effect-free projection of the
//! same in-memory result; the canonical `start`/`end` values stay unrounded
//! and each format applies its own presentation rule. The timestamp table,
//! JSON and raw JSON round to 2 decimal places; SRT truncates to whole
//! seconds. That asymmetry is intentional.

use serde::Serialize;

use crate::types::Transcript;

/// Round to 2 decimal places, shared by the table and JSON formats.
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// SRT timestamp with integer-truncated seconds and a fixed `,000`
/// millisecond suffix: `12.99` becomes `00:00:12,000`.
fn srt_time(seconds: f64) -> String {
    let total = seconds as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{h:02}:{m:02}:{s:02},000")
}

/// Per-segment view carrying only timing and text.
#[derive(Debug, Clone, Serialize)]
pub struct BriefSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Per-segment view carrying whisper's diagnostics.
/// Token-level data is deliberately excluded.
#[derive(Debug, Clone, Serialize)]
pub struct RawSegment {
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub seek: i64,
    pub temperature: f32,
    pub avg_logprob: f64,
    pub compression_ratio: f64,
    pub no_speech_prob: f32,
}

impl Transcript {
    /// Markdown table of segment timings, one row per segment in order.
    pub fn to_markdown_table(&self) -> String {
        let mut lines = vec![
            "| Start | End | Text |".to_string(),
            "|----|----|----|".to_string(),
        ];
        for seg in &self.segments {
            lines.push(format!("| {:.2} | {:.2} | {} |", seg.start, seg.end, seg.text));
        }
        lines.join("\n")
    }

    /// `(start, end, text)` tuples for programmatic table rendering.
    pub fn rows(&self) -> Vec<(f64, f64, &str)> {
        self.segments
            .iter()
            .map(|s| (round2(s.start), round2(s.end), s.text.as_str()))
            .collect()
    }

    /// One object per segment with exactly `start`, `end`, `text`.
    pub fn segments_brief(&self) -> Vec<BriefSegment> {
        self.segments
            .iter()
            .map(|s| BriefSegment {
                start: round2(s.start),
                end: round2(s.end),
                text: s.text.clone(),
            })
            .collect()
    }

    /// Pretty-printed JSON of [`Transcript::segments_brief`].
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.segments_brief())?)
    }

    /// One object per segment with the full diagnostic field set.
    pub fn segments_raw(&self) -> Vec<RawSegment> {
        self.segments
            .iter()
            .map(|s| RawSegment {
                id: s.id,
                start: round2(s.start),
                end: round2(s.end),
                text: s.text.clone(),
                seek: s.seek,
                temperature: s.temperature,
                avg_logprob: s.avg_logprob,
                compression_ratio: s.compression_ratio,
                no_speech_prob: s.no_speech_prob,
            })
            .collect()
    }

    /// Pretty-printed JSON of [`Transcript::segments_raw`].
    pub fn to_json_raw(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.segments_raw())?)
    }

    /// SubRip subtitles. Sequence numbers are `id + 1`; timestamps use
    /// truncated whole seconds (see [`module docs`](self)).
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                seg.id + 1,
                srt_time(seg.start),
                srt_time(seg.end),
                seg.text.trim_start()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn segment(id: u32, start: f64, end: f64, text: &str) -> Segment {
        Segment {
            id,
            start,
            end,
            text: text.to_string(),
            seek: (start * 100.0) as i64,
            temperature: 0.0,
            avg_logprob: -0.25,
            compression_ratio: 1.4,
            no_speech_prob: 0.01,
        }
    }

    fn sample() -> Transcript {
        Transcript {
            text: "hello world again".to_string(),
            segments: vec![
                segment(0, 0.0, 2.345, "hello world"),
                segment(1, 2.345, 12.99, "again"),
            ],
            language: "en".to_string(),
            duration: 13.0,
            model: "base".to_string(),
            source_url: None,
            source_title: None,
        }
    }

    #[test]
    fn markdown_table_rows_in_order() {
        let md = sample().to_markdown_table();
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| Start | End | Text |");
        assert_eq!(lines[1], "|----|----|----|");
        assert_eq!(lines[2], "| 0.00 | 2.35 | hello world |");
        assert_eq!(lines[3], "| 2.35 | 12.99 | again |");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn rows_and_json_agree() {
        let t = sample();
        let rows = t.rows();
        let brief = t.segments_brief();
        assert_eq!(rows.len(), brief.len());
        for (row, b) in rows.iter().zip(&brief) {
            assert_eq!(row.0, b.start);
            assert_eq!(row.1, b.end);
            assert_eq!(row.2, b.text);
        }
    }

    #[test]
    fn json_rounds_to_two_decimals() {
        let brief = sample().segments_brief();
        assert_eq!(brief[0].end, 2.35);
        assert_eq!(brief[1].start, 2.35);
    }

    #[test]
    fn raw_json_has_exact_field_set() {
        let json = sample().to_json_raw().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let objects = value.as_array().unwrap();
        assert_eq!(objects.len(), 2);
        for obj in objects {
            let map = obj.as_object().unwrap();
            assert_eq!(map.len(), 9);
            for field in [
                "id",
                "start",
                "end",
                "text",
                "seek",
                "temperature",
                "avg_logprob",
                "compression_ratio",
                "no_speech_prob",
            ] {
                assert!(map.contains_key(field), "missing field {field}");
            }
            assert!(!map.contains_key("tokens"));
        }
    }

    #[test]
    fn srt_numbering_and_truncation() {
        let srt = sample().to_srt();
        let blocks: Vec<&str> = srt.split("\n\n").filter(|b| !b.is_empty()).collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("1\n00:00:00,000 --> 00:00:02,000\n"));
        // 12.99 truncates, never rounds up to 13
        assert!(blocks[1].starts_with("2\n00:00:02,000 --> 00:00:12,000\n"));
        assert!(srt.ends_with("\n\n"));
    }

    #[test]
    fn srt_left_trims_text() {
        let mut t = sample();
        t.segments[0].text = "  padded".to_string();
        assert!(t.to_srt().contains("00:00:02,000\npadded\n"));
    }

    #[test]
    fn srt_hours_and_minutes() {
        let mut t = sample();
        t.segments[0].start = 3661.5;
        t.segments[0].end = 3725.0;
        let srt = t.to_srt();
        assert!(srt.contains("01:01:01,000 --> 01:02:05,000"));
    }

    #[test]
    fn formatters_are_independent() {
        let t = sample();
        let first = (t.to_markdown_table(), t.to_srt(), t.to_json().unwrap());
        let second = (t.to_markdown_table(), t.to_srt(), t.to_json().unwrap());
        assert_eq!(first, second);
    }
}
