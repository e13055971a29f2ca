// Media library indexing
//
// - scanner: walks the media root and classifies video files
// - reconcile: diffs a scan against stored entries
// - watch: series/season auto-watch rules

pub mod reconcile;
pub mod scanner;
pub mod watch;

pub use reconcile::LibraryScanner;
pub use scanner::{classify, scan_filesystem, VIDEO_EXTENSIONS};
pub use watch::SeriesWatchService;
