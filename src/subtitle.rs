use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::error::{Result, TranslarrError};

/// Sections carrying only presentation data
const COSMETIC_SECTIONS: &[&str] = &[
    "[v4+ styles]",
    "[v4 styles]",
    "[fonts]",
    "[graphics]",
    "[aegisub project garbage]",
    "[aegisub extradata]",
];

/// Sections holding uuencoded data, whose lines may look like `[...]` headers
const EMBEDDED_DATA_SECTIONS: &[&str] = &["[fonts]", "[graphics]"];

/// Section names that always open a new section
const KNOWN_SECTIONS: &[&str] = &[
    "[script info]",
    "[v4+ styles]",
    "[v4 styles]",
    "[v4++ styles]",
    "[events]",
    "[fonts]",
    "[graphics]",
    "[aegisub project garbage]",
    "[aegisub extradata]",
];

/// Style/effect markers of lines that are not spoken dialogue
const NON_DIALOG_STYLES: &[&str] = &["credit", "karaoke", "kara", "lyric", "fx"];

/// Event fields used when the file has no `Format:` line
const DEFAULT_EVENT_FORMAT: &[&str] = &[
    "layer", "start", "end", "style", "name", "marginl", "marginr", "marginv", "effect", "text",
];

static RE_OVERRIDE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());
static RE_ASS_ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\[Nnh]").unwrap());

/// Path of the translated subtitle beside a video: `<dir>/<base-name>.<lang>.srt`
pub fn companion_subtitle_path(video_path: &Path, lang: &str) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    video_path.with_file_name(format!("{}.{}.srt", stem, lang))
}

/// Path an extracted stream is written to: `<work_dir>/<base-name>.<lang>.<ext>`
pub fn extracted_subtitle_path(work_dir: &Path, file_name: &str, lang: &str, extension: &str) -> PathBuf {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    work_dir.join(format!("{}.{}.{}", stem, lang, extension))
}

/// Counts reported after cleaning an ASS/SSA document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub kept_dialogue: usize,
    pub dropped_lines: usize,
}

struct EventFormat {
    fields: Vec<String>,
}

impl EventFormat {
    fn parse(line: &str) -> Self {
        Self {
            fields: line.split(',').map(|f| f.trim().to_lowercase()).collect(),
        }
    }

    fn default_format() -> Self {
        Self {
            fields: DEFAULT_EVENT_FORMAT.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

enum DialogueLine {
    Keep(String),
    Drop,
}

fn clean_dialogue(body: &str, format: &EventFormat) -> DialogueLine {
    let field_count = format.fields.len().max(1);
    let fields: Vec<&str> = body.splitn(field_count, ',').collect();

    // Malformed line, leave untouched
    if fields.len() < field_count {
        return DialogueLine::Keep(format!("Dialogue:{}", body));
    }

    let is_marked = |name: &str| {
        format
            .position(name)
            .and_then(|i| fields.get(i))
            .map(|value| {
                let value = value.to_lowercase();
                NON_DIALOG_STYLES.iter().any(|marker| value.contains(marker))
            })
            .unwrap_or(false)
    };

    if is_marked("style") || is_marked("effect") {
        return DialogueLine::Drop;
    }

    let text = RE_OVERRIDE_TAG.replace_all(fields[field_count - 1], "");
    if !RE_ASS_ESCAPE.replace_all(&text, " ").chars().any(char::is_alphabetic) {
        return DialogueLine::Drop;
    }

    let mut line = String::from("Dialogue:");
    for field in &fields[..field_count - 1] {
        line.push_str(field);
        line.push(',');
    }
    line.push_str(&text);
    DialogueLine::Keep(line)
}

/// Lowercased section name when `line` opens a new section.
///
/// Inside embedded font or graphic data only known section names count.
fn section_header(line: &str, current: &str) -> Option<String> {
    if !(line.starts_with('[') && line.ends_with(']')) {
        return None;
    }
    let name = line.to_lowercase();
    if EMBEDDED_DATA_SECTIONS.contains(&current) && !KNOWN_SECTIONS.contains(&name.as_str()) {
        return None;
    }
    Some(name)
}

/// Strip an ASS/SSA document down to its spoken dialogue.
///
/// Cosmetic sections are dropped whole. In `[Events]`, comments go, override
/// tags such as `{\an8}` are removed, and dialogue styled as credits, karaoke,
/// lyrics or effects is discarded along with lines that have no letters left.
pub fn clean_ass(content: &str) -> (String, CleanStats) {
    let mut output = Vec::new();
    let mut stats = CleanStats::default();
    let mut section = String::new();
    let mut format = EventFormat::default_format();

    for raw in content.trim_start_matches('\u{feff}').lines() {
        let line = raw.trim_end_matches('\r');
        let trimmed = line.trim();

        if let Some(header) = section_header(trimmed, &section) {
            section = header;
            if !COSMETIC_SECTIONS.contains(&section.as_str()) {
                output.push(line.to_string());
            }
            continue;
        }

        if COSMETIC_SECTIONS.contains(&section.as_str()) {
            continue;
        }

        if section != "[events]" {
            output.push(line.to_string());
            continue;
        }

        if let Some(fields) = trimmed.strip_prefix("Format:") {
            format = EventFormat::parse(fields);
            output.push(line.to_string());
        } else if trimmed.starts_with("Comment:") {
            stats.dropped_lines += 1;
        } else if let Some(body) = trimmed.strip_prefix("Dialogue:") {
            match clean_dialogue(body, &format) {
                DialogueLine::Keep(cleaned) => {
                    stats.kept_dialogue += 1;
                    output.push(cleaned);
                }
                DialogueLine::Drop => stats.dropped_lines += 1,
            }
        } else {
            output.push(line.to_string());
        }
    }

    let mut cleaned = output.join("\n");
    cleaned.push('\n');
    (cleaned, stats)
}

/// Clean an ASS/SSA file in place
pub async fn clean_ass_file(path: &Path) -> Result<CleanStats> {
    let bytes = tokio::fs::read(path).await?;
    let (cleaned, stats) = clean_ass(&String::from_utf8_lossy(&bytes));

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomically(&target, &cleaned))
        .await
        .map_err(|e| TranslarrError::Task(format!("Subtitle write panicked: {}", e)))??;

    info!(
        "Cleaned {}: kept {} dialogue lines, dropped {}",
        path.display(),
        stats.kept_dialogue,
        stats.dropped_lines
    );
    Ok(stats)
}

fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|e| TranslarrError::Io(e.error))?;
    Ok(())
}

/// Remove markdown code fences a model may wrap its answer in
pub fn strip_code_fences(text: &str) -> String {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        // Drop the opening fence along with its language hint
        body = rest.split_once('\n').map(|(_, after)| after).unwrap_or("");
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }

    let mut stripped = body.trim().to_string();
    stripped.push('\n');
    debug!("Translated subtitle is {} bytes", stripped.len());
    stripped
}

/// Write translated text beside the video, replacing any previous file
pub async fn save_translation(video_path: &Path, lang: &str, text: &str) -> Result<PathBuf> {
    let output_path = companion_subtitle_path(video_path, lang);
    let content = strip_code_fences(text);

    let target = output_path.clone();
    tokio::task::spawn_blocking(move || write_atomically(&target, &content))
        .await
        .map_err(|e| TranslarrError::Task(format!("Subtitle write panicked: {}", e)))??;

    info!("Saved translated subtitles to {}", output_path.display());
    Ok(output_path)
}
