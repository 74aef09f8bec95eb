use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::config::{FailurePolicy, GalleryConfig};
use crate::error::{FileError, IndexError};
use crate::models::{IndexEntry, TripSummary};
use crate::projection::Reprojector;
use crate::render::render_track;
use crate::tiles::TileSource;

const DOWNLOAD_LABEL: &str = "Download track";

/// Result of running the pipeline on one track file.
#[derive(Debug)]
pub enum FileOutcome {
    Rendered {
        entry: IndexEntry,
        summary: TripSummary,
    },
    Failed {
        file: PathBuf,
        error: FileError,
    },
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

#[derive(Debug)]
pub struct GalleryReport {
    pub outcomes: Vec<FileOutcome>,
    pub document: PathBuf,
}

impl GalleryReport {
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> + '_ {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Rendered { entry, .. } => Some(entry),
            FileOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &FileError)> + '_ {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Failed { file, error } => Some((file.as_path(), error)),
            FileOutcome::Rendered { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    pub title: String,
    pub base_url: String,
    pub entries: Vec<IndexEntry>,
}

impl IndexDocument {
    pub fn to_markdown(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let sections: Vec<String> = self
            .entries
            .iter()
            .map(|entry| {
                let IndexEntry {
                    name,
                    image_path,
                    source_path,
                } = entry;
                format!(
                    "### {name}\n\n![{name}]({base}/{image_path})\n\n[{DOWNLOAD_LABEL}]({base}/{source_path})\n"
                )
            })
            .collect();

        format!("# {}\n\n{}", self.title, sections.join("\n---\n"))
    }

    pub fn write_to(&self, path: &Path) -> Result<(), IndexError> {
        fs::write(path, self.to_markdown()).map_err(|source| IndexError::Write {
            source,
            path: path.into(),
        })
    }
}

/// Regular files in `dir` with the given extension, ignoring case, sorted by name.
pub fn list_track_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, IndexError> {
    let read_dir_error = |source| IndexError::ReadDir {
        source,
        path: dir.into(),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn entry_for(track_path: &Path) -> IndexEntry {
    let name = track_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source_path = track_path
        .file_name()
        .map(|file| file.to_string_lossy().into_owned())
        .unwrap_or_default();
    IndexEntry {
        image_path: format!("{name}.png"),
        name,
        source_path,
    }
}

/// Renders every track in the input directory, one after the other.
///
/// With [`FailurePolicy::Abort`] nothing after the first failing file is
/// attempted; the failure is the last outcome returned.
pub async fn process_directory<S: TileSource>(
    config: &GalleryConfig,
    reprojector: &Reprojector,
    tiles: &S,
) -> Result<Vec<FileOutcome>, IndexError> {
    let files = list_track_files(&config.input_dir, &config.extension)?;
    tracing::info!("found {} track(s) in {:?}", files.len(), config.input_dir);

    let mut outcomes = Vec::with_capacity(files.len());
    let mut rendered_from: HashMap<PathBuf, PathBuf> = HashMap::new();
    for path in files {
        let image_path = path.with_extension("png");
        if let Some(earlier) = rendered_from.get(&image_path) {
            let error = FileError::ImageClash {
                image: image_path,
                earlier: earlier.clone(),
            };
            tracing::warn!("skipping {:?}: {}", path, error);
            outcomes.push(FileOutcome::Failed { file: path, error });
            if config.failure_policy == FailurePolicy::Abort {
                break;
            }
            continue;
        }
        rendered_from.insert(image_path.clone(), path.clone());

        match render_track(&path, &image_path, reprojector, tiles, &config.style).await {
            Ok(summary) => {
                tracing::info!(
                    "rendered {:?}: {:.1} km, {:.0} m ascent",
                    image_path,
                    summary.distance_km(),
                    summary.ascent_m
                );
                outcomes.push(FileOutcome::Rendered {
                    entry: entry_for(&path),
                    summary,
                });
            }
            Err(error) => {
                tracing::warn!("failed to render {:?}: {}", path, error);
                outcomes.push(FileOutcome::Failed { file: path, error });
                if config.failure_policy == FailurePolicy::Abort {
                    break;
                }
            }
        }
    }

    Ok(outcomes)
}

/// Renders the directory and writes the index document.
///
/// Output is not transactional: under [`FailurePolicy::Abort`] images
/// rendered before the failure stay on disk but the document is not written.
pub async fn build_gallery<S: TileSource>(
    config: &GalleryConfig,
    tiles: &S,
) -> Result<GalleryReport, IndexError> {
    let reprojector = Reprojector::web_mercator()?;
    let mut outcomes = process_directory(config, &reprojector, tiles).await?;

    if config.failure_policy == FailurePolicy::Abort
        && outcomes.last().is_some_and(FileOutcome::is_failure)
    {
        if let Some(FileOutcome::Failed { file, error }) = outcomes.pop() {
            return Err(IndexError::Aborted {
                source: error,
                file,
            });
        }
    }

    let report = GalleryReport {
        outcomes,
        document: config.output_document.clone(),
    };
    let document = IndexDocument {
        title: config.title.clone(),
        base_url: config.base_url.clone(),
        entries: report.entries().cloned().collect(),
    };
    document.write_to(&config.output_document)?;
    tracing::info!(
        "wrote {:?} with {} entr(ies)",
        config.output_document,
        document.entries.len()
    );

    Ok(report)
}
