use crate::ast::Package;
use crate::error::{Error, Result};
use crate::parser::AstParser;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use walkdir::WalkDir;

/// Project scanner that parses every package directory below a root.
///
/// Walking and parsing run on a producer thread. Per-directory failures are
/// streamed to the calling thread, which logs them and keeps going; a
/// broken subtree never aborts the scan.
///
/// The following directories are skipped:
/// - the top-level `vendor` directory
/// - any directory whose path contains `tests`
/// - hidden directories (starting with `.`)
///
/// # Example
///
/// ```no_run
/// use beego_swagger::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} packages", result.packages.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of a scan.
pub struct ScanResult {
    /// Every package parsed below the root, in directory order
    pub packages: Vec<Package>,
    /// Warning messages for directories that could not be walked or parsed
    pub warnings: Vec<String>,
}

enum ScanEvent {
    Parsed(Vec<Package>),
    Failed(String),
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Walks the tree and parses each directory's Go files.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a readable directory.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root_path.display()),
            )));
        }

        let (tx, rx) = mpsc::channel();
        let root = self.root_path.clone();
        let producer = thread::spawn(move || {
            let vendor = root.join("vendor");
            let walker = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.path() == root || !is_skipped(e.path(), &root, &vendor));
            for entry in walker {
                let mut events = Vec::new();
                match entry {
                    Ok(entry) if entry.file_type().is_dir() => {
                        match AstParser::parse_dir(entry.path()) {
                            Ok(parsed) => {
                                events.extend(parsed.skipped.into_iter().map(|e| {
                                    ScanEvent::Failed(format!("Skipped file: {}", e))
                                }));
                                if !parsed.packages.is_empty() {
                                    events.push(ScanEvent::Parsed(parsed.packages));
                                }
                            }
                            Err(e) => events.push(ScanEvent::Failed(format!(
                                "Failed to parse {}: {}",
                                entry.path().display(),
                                e
                            ))),
                        }
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        events.push(ScanEvent::Failed(format!("Failed to access path: {}", e)))
                    }
                }
                if events.into_iter().any(|event| tx.send(event).is_err()) {
                    break;
                }
            }
        });

        let mut packages = Vec::new();
        let mut warnings = Vec::new();
        // The loop ends when the producer drops its sender.
        for event in rx {
            match event {
                ScanEvent::Parsed(parsed) => packages.extend(parsed),
                ScanEvent::Failed(warning) => {
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }
        if producer.join().is_err() {
            let warning = "Directory walker terminated unexpectedly".to_string();
            warn!("{}", warning);
            warnings.push(warning);
        }

        debug!(
            "Scanned {}: {} package(s), {} warning(s)",
            self.root_path.display(),
            packages.len(),
            warnings.len()
        );
        Ok(ScanResult { packages, warnings })
    }
}

fn is_skipped(path: &Path, root: &Path, vendor: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with('.'));
    let relative = path.strip_prefix(root).unwrap_or(path);
    hidden || path == vendor || relative.to_string_lossy().contains("tests")
}
