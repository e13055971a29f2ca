use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::Result;

/// Language recorded when a stream carries no language tag
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Tags that mark an English stream
const ENGLISH_TAGS: &[&str] = &["eng", "en"];

/// Markers of secondary tracks that are not the main dialogue
const NON_DIALOG_MARKERS: &[&str] = &["s&s", "honorifics", "signs", "songs"];

static RE_SDH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(sdh|cc|hearing[ _-]?impaired|descriptive|closed[ _-]?captions?)\b").unwrap()
});

/// Codec of an embedded subtitle stream, as reported by ffprobe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleCodec {
    Ass,
    Ssa,
    SubRip,
    WebVtt,
    MovText,
    Text,
    /// Image-based subtitles that cannot be turned into text
    Bitmap(String),
    /// Any other text codec; converted to SRT on extraction
    Other(String),
}

impl SubtitleCodec {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "ass" => SubtitleCodec::Ass,
            "ssa" => SubtitleCodec::Ssa,
            "subrip" | "srt" => SubtitleCodec::SubRip,
            "webvtt" => SubtitleCodec::WebVtt,
            "mov_text" => SubtitleCodec::MovText,
            "text" => SubtitleCodec::Text,
            other @ ("hdmv_pgs_subtitle" | "dvd_subtitle" | "dvb_subtitle" | "xsub" | "dvb_teletext") => {
                SubtitleCodec::Bitmap(other.to_string())
            }
            other => SubtitleCodec::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SubtitleCodec::Ass => "ass",
            SubtitleCodec::Ssa => "ssa",
            SubtitleCodec::SubRip => "subrip",
            SubtitleCodec::WebVtt => "webvtt",
            SubtitleCodec::MovText => "mov_text",
            SubtitleCodec::Text => "text",
            SubtitleCodec::Bitmap(name) | SubtitleCodec::Other(name) => name,
        }
    }

    /// Styled formats that need cleaning and conversion before translation
    pub fn is_advanced(&self) -> bool {
        matches!(self, SubtitleCodec::Ass | SubtitleCodec::Ssa)
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, SubtitleCodec::Bitmap(_))
    }

    /// File extension of the extracted stream
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleCodec::Ass => "ass",
            SubtitleCodec::Ssa => "ssa",
            _ => "srt",
        }
    }

    /// ffmpeg encoder for extraction. ASS/SSA and SubRip are copied as-is;
    /// everything else, WebVTT included, is re-encoded to SubRip.
    pub fn encoder(&self) -> &'static str {
        match self {
            SubtitleCodec::Ass | SubtitleCodec::Ssa | SubtitleCodec::SubRip => "copy",
            _ => "srt",
        }
    }
}

/// One embedded subtitle stream of a video file
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStream {
    /// Absolute stream index within the container
    pub index: u32,
    pub codec: SubtitleCodec,
    pub language: Option<String>,
    pub title: Option<String>,
    pub hearing_impaired: bool,
}

impl SubtitleStream {
    pub fn language_or_und(&self) -> &str {
        self.language.as_deref().unwrap_or(UNDETERMINED_LANGUAGE)
    }

    pub fn is_english(&self) -> bool {
        self.language
            .as_deref()
            .map(|lang| ENGLISH_TAGS.iter().any(|tag| lang.eq_ignore_ascii_case(tag)))
            .unwrap_or(false)
    }

    /// Hearing-impaired / closed caption variant
    pub fn is_sdh(&self) -> bool {
        self.hearing_impaired || self.tag_values().any(|value| RE_SDH.is_match(value))
    }

    fn mentions(&self, marker: &str) -> bool {
        self.tag_values().any(|value| value.to_lowercase().contains(marker))
    }

    fn is_dialog(&self) -> bool {
        self.mentions("dialog")
    }

    fn is_non_dialog(&self) -> bool {
        NON_DIALOG_MARKERS.iter().any(|marker| self.mentions(marker))
    }

    fn tag_values(&self) -> impl Iterator<Item = &str> {
        self.language.as_deref().into_iter().chain(self.title.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    disposition: BTreeMap<String, i64>,
}

impl ProbeStream {
    fn tag(&self, key: &str) -> Option<String> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Parse `ffprobe -print_format json -show_streams` output into subtitle streams
pub fn parse_probe_output(json: &str) -> Result<Vec<SubtitleStream>> {
    let output: ProbeOutput = serde_json::from_str(json)?;

    Ok(output
        .streams
        .into_iter()
        .filter(|s| s.codec_type.as_deref().map(|t| t == "subtitle").unwrap_or(true))
        .map(|s| SubtitleStream {
            index: s.index,
            codec: SubtitleCodec::from_name(s.codec_name.as_deref().unwrap_or("unknown")),
            language: s.tag("language"),
            title: s.tag("title"),
            hearing_impaired: s.disposition.get("hearing_impaired").copied().unwrap_or(0) != 0,
        })
        .collect())
}

/// Choose the subtitle stream that best represents the main English dialogue.
///
/// Bitmap streams are never candidates. Among text streams, English ones are
/// preferred, SDH variants are dropped unless nothing else is left, a stream
/// tagged as dialogue wins outright, and signs/songs tracks lose to anything
/// untagged.
pub fn select_best_stream(streams: &[SubtitleStream]) -> Option<&SubtitleStream> {
    let text: Vec<&SubtitleStream> = streams.iter().filter(|s| s.codec.is_text()).collect();
    let first = text.first().copied()?;

    let english: Vec<&SubtitleStream> = text.iter().copied().filter(|s| s.is_english()).collect();
    let pool = if english.is_empty() { &text } else { &english };

    let non_sdh: Vec<&SubtitleStream> = pool.iter().copied().filter(|s| !s.is_sdh()).collect();
    let candidates = if non_sdh.is_empty() { pool } else { &non_sdh };

    if let Some(dialog) = candidates.iter().copied().find(|s| s.is_dialog()) {
        return Some(dialog);
    }

    candidates
        .iter()
        .copied()
        .find(|s| !s.is_non_dialog())
        .or_else(|| non_sdh.first().copied())
        .or_else(|| english.first().copied())
        .or(Some(first))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: u32, codec: &str, language: Option<&str>, title: Option<&str>) -> SubtitleStream {
        SubtitleStream {
            index,
            codec: SubtitleCodec::from_name(codec),
            language: language.map(str::to_string),
            title: title.map(str::to_string),
            hearing_impaired: false,
        }
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"index": 2, "codec_name": "ass", "codec_type": "subtitle",
                 "tags": {"language": "eng", "title": "Full Dialog"},
                 "disposition": {"default": 1, "hearing_impaired": 0}},
                {"index": 3, "codec_name": "subrip", "codec_type": "subtitle",
                 "tags": {"LANGUAGE": "jpn"}, "disposition": {"hearing_impaired": 1}},
                {"index": 4, "codec_name": "hdmv_pgs_subtitle", "codec_type": "subtitle"}
            ]
        }"#;

        let streams = parse_probe_output(json).unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].codec, SubtitleCodec::Ass);
        assert_eq!(streams[0].title.as_deref(), Some("Full Dialog"));
        assert_eq!(streams[1].language.as_deref(), Some("jpn"));
        assert!(streams[1].hearing_impaired);
        assert_eq!(streams[2].language_or_und(), "und");
        assert!(!streams[2].codec.is_text());
    }

    #[test]
    fn test_parse_empty_probe_output() {
        assert!(parse_probe_output("{}").unwrap().is_empty());
        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_codec_extraction_format() {
        assert_eq!(SubtitleCodec::from_name("subrip").extension(), "srt");
        assert_eq!(SubtitleCodec::from_name("subrip").encoder(), "copy");
        assert_eq!(SubtitleCodec::from_name("ass").extension(), "ass");
        assert!(SubtitleCodec::from_name("SSA").is_advanced());
        assert_eq!(SubtitleCodec::from_name("mov_text").extension(), "srt");
        assert_eq!(SubtitleCodec::from_name("mov_text").encoder(), "srt");
    }

    #[test]
    fn test_webvtt_is_reencoded_to_srt() {
        let codec = SubtitleCodec::from_name("webvtt");
        assert_eq!(codec.extension(), "srt");
        assert_eq!(codec.encoder(), "srt");
        assert!(!codec.is_advanced());
    }

    #[test]
    fn test_prefers_dialog_over_signs() {
        let streams = vec![
            stream(2, "ass", Some("eng"), Some("Signs & Songs")),
            stream(3, "ass", Some("eng"), Some("Dialogue")),
        ];
        assert_eq!(select_best_stream(&streams).map(|s| s.index), Some(3));
    }

    #[test]
    fn test_prefers_untagged_over_signs() {
        let streams = vec![
            stream(2, "ass", Some("eng"), Some("Signs")),
            stream(3, "ass", Some("eng"), None),
        ];
        assert_eq!(select_best_stream(&streams).map(|s| s.index), Some(3));
    }

    #[test]
    fn test_excludes_sdh_unless_only_option() {
        let streams = vec![
            stream(2, "subrip", Some("eng"), Some("English (SDH)")),
            stream(3, "subrip", Some("eng"), Some("English")),
        ];
        assert_eq!(select_best_stream(&streams).map(|s| s.index), Some(3));

        let only_sdh = vec![stream(5, "subrip", Some("eng"), Some("English CC"))];
        assert_eq!(select_best_stream(&only_sdh).map(|s| s.index), Some(5));
    }

    #[test]
    fn test_sdh_needs_word_boundary() {
        let accented = stream(2, "subrip", Some("eng"), Some("Accented"));
        assert!(!accented.is_sdh());
        let mut flagged = stream(3, "subrip", Some("eng"), None);
        flagged.hearing_impaired = true;
        assert!(flagged.is_sdh());
    }

    #[test]
    fn test_english_preferred_over_first_stream() {
        let streams = vec![
            stream(2, "subrip", Some("jpn"), None),
            stream(3, "subrip", Some("en"), None),
        ];
        assert_eq!(select_best_stream(&streams).map(|s| s.index), Some(3));
    }

    #[test]
    fn test_falls_back_to_first_text_stream() {
        let streams = vec![
            stream(2, "hdmv_pgs_subtitle", Some("eng"), None),
            stream(3, "subrip", Some("ger"), Some("Signs")),
            stream(4, "subrip", Some("fre"), Some("Songs")),
        ];
        assert_eq!(select_best_stream(&streams).map(|s| s.index), Some(3));
    }

    #[test]
    fn test_no_text_streams_selects_nothing() {
        assert!(select_best_stream(&[]).is_none());
        let bitmap_only = vec![stream(2, "dvd_subtitle", Some("eng"), None)];
        assert!(select_best_stream(&bitmap_only).is_none());
    }
}
