use std::path::{Component, Path};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Result, TranslarrError};
use crate::models::VideoFile;

/// Extensions (lowercase, without dot) treated as video files
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "m4v", "webm", "flv"];

const UNKNOWN: &str = "Unknown";

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Walk the media root and classify every video file below it.
///
/// Files that cannot be classified are logged and skipped; only a missing
/// root aborts the scan.
pub fn scan_filesystem(media_root: &Path) -> Result<Vec<VideoFile>> {
    info!("Scanning media files under {}", media_root.display());

    if !media_root.is_dir() {
        return Err(TranslarrError::DirectoryNotFound(media_root.display().to_string()));
    }

    let mut video_files = Vec::new();

    for entry in WalkDir::new(media_root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Could not read directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_video_file(entry.path()) {
            continue;
        }

        match classify(media_root, entry.path()) {
            Ok(video) => video_files.push(video),
            Err(e) => warn!("Could not process file {}: {}", entry.path().display(), e),
        }
    }

    info!("Found {} video files", video_files.len());
    Ok(video_files)
}

/// Infer series and season from the path relative to the media root.
///
/// `Series/Season/file.mkv` is the expected layout; any extra leading folders
/// (e.g. `Anime/Series/Season/file.mkv`) are ignored. Shallower layouts use the
/// first folder as series and the parent folder as season.
pub fn classify(media_root: &Path, file_path: &Path) -> Result<VideoFile> {
    let relative = pathdiff::diff_paths(file_path, media_root).ok_or_else(|| {
        TranslarrError::Validation(format!("{} is not below the media root", file_path.display()))
    })?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => Ok(part.to_string_lossy().into_owned()),
            _ => Err(TranslarrError::Validation(format!(
                "{} is not below the media root",
                file_path.display()
            ))),
        })
        .collect::<Result<_>>()?;

    let file_name = parts
        .last()
        .cloned()
        .ok_or_else(|| TranslarrError::Validation(format!("{} has no file name", file_path.display())))?;

    let (series, season) = match parts.len() {
        0 | 1 => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        2 => (parts[0].clone(), parts[0].clone()),
        n => (parts[n - 3].clone(), parts[n - 2].clone()),
    };

    Ok(VideoFile {
        file_path: file_path.to_path_buf(),
        file_name,
        series,
        season,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_classify_series_season_layout() {
        let video = classify(Path::new("/media"), Path::new("/media/Show/Season 1/e01.mkv")).unwrap();
        assert_eq!(video.series, "Show");
        assert_eq!(video.season, "Season 1");
        assert_eq!(video.file_name, "e01.mkv");
        assert_eq!(video.file_path, PathBuf::from("/media/Show/Season 1/e01.mkv"));
    }

    #[test]
    fn test_classify_ignores_category_folders() {
        let video = classify(Path::new("/media"), Path::new("/media/Anime/2024/Show/S2/e05.mkv")).unwrap();
        assert_eq!(video.series, "Show");
        assert_eq!(video.season, "S2");
    }

    #[test]
    fn test_classify_shallow_layouts() {
        let one_folder = classify(Path::new("/media"), Path::new("/media/Movie/movie.mp4")).unwrap();
        assert_eq!(one_folder.series, "Movie");
        assert_eq!(one_folder.season, "Movie");

        let at_root = classify(Path::new("/media"), Path::new("/media/loose.mkv")).unwrap();
        assert_eq!(at_root.series, "Unknown");
        assert_eq!(at_root.season, "Unknown");
    }

    #[test]
    fn test_classify_rejects_paths_outside_root() {
        assert!(classify(Path::new("/media"), Path::new("/other/Show/S1/e01.mkv")).is_err());
    }

    #[test]
    fn test_video_extension_matching_is_case_insensitive() {
        assert!(is_video_file(Path::new("a/b/EP01.MKV")));
        assert!(is_video_file(Path::new("clip.m4v")));
        assert!(!is_video_file(Path::new("e01.pl.srt")));
        assert!(!is_video_file(Path::new("README")));
    }

    #[test]
    fn test_scan_filesystem_filters_and_classifies() {
        let root = tempfile::tempdir().unwrap();
        let season = root.path().join("Show").join("S1");
        fs::create_dir_all(&season).unwrap();
        fs::write(season.join("e01.mkv"), b"").unwrap();
        fs::write(season.join("e02.MP4"), b"").unwrap();
        fs::write(season.join("e01.pl.srt"), b"").unwrap();
        fs::write(season.join("notes.txt"), b"").unwrap();

        let files = scan_filesystem(root.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["e01.mkv", "e02.MP4"]);
        assert!(files.iter().all(|f| f.series == "Show" && f.season == "S1"));
    }

    #[test]
    fn test_scan_missing_root_is_directory_not_found() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        assert!(matches!(
            scan_filesystem(&missing),
            Err(TranslarrError::DirectoryNotFound(_))
        ));
    }
}
