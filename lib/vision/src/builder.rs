//! Builds an [`EmbeddingIndex`] from a reference collection on disk.

use crate::pipeline::Pipeline;
use imgsim_core::{
    BuildReport, EmbeddingIndex, Error, IndexWriter, Result, SkipReason, SkippedItem, Vector,
};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A file found under the collection root
#[derive(Debug, Clone)]
struct CollectionFile {
    /// `/`-separated path relative to the root
    id: String,
    path: PathBuf,
}

pub struct IndexBuilder {
    pipeline: Pipeline,
}

impl IndexBuilder {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Embed every decodable image under `root`.
    ///
    /// Files that fail are skipped and recorded in the report. A missing root
    /// yields an empty index.
    pub fn build(&self, root: &Path) -> Result<EmbeddingIndex> {
        let started = Instant::now();
        let stamp = self.pipeline.stamp();

        if !root.exists() {
            warn!("Collection root {:?} does not exist, index is empty", root);
            return Ok(EmbeddingIndex::empty(stamp));
        }
        if !root.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "collection root {:?} is not a directory",
                root
            )));
        }

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        walk(root, root, &mut files, &mut skipped)?;
        let files_seen = files.len();
        info!("Indexing {} files from {:?}", files_seen, root);

        // Parallel embed, results stay in walk order
        let embedded: Vec<(CollectionFile, Result<Vector>)> = files
            .into_par_iter()
            .map(|file| {
                let result = self.pipeline.embed_path(&file.path);
                (file, result)
            })
            .collect();

        let mut writer = IndexWriter::new(stamp);
        for (file, result) in embedded {
            let outcome = result.and_then(|vector| writer.insert(file.id.clone(), vector));
            match outcome {
                Ok(()) => debug!("Indexed: {}", file.id),
                Err(Error::UnsupportedImage(_)) => {
                    warn!("Skipping (not image): {}", file.id);
                    skipped.push(SkippedItem {
                        path: file.id,
                        reason: SkipReason::NotAnImage,
                    });
                }
                Err(e) => {
                    warn!("Error loading {}: {}", file.id, e);
                    skipped.push(SkippedItem {
                        path: file.id,
                        reason: SkipReason::Failed(e.to_string()),
                    });
                }
            }
        }

        let report = BuildReport::new(files_seen, skipped, started.elapsed());
        let index = writer.finish(report);
        info!(
            "Dataset indexed: {} images ({} skipped) in {} ms",
            index.len(),
            index.report().skipped_count(),
            index.report().duration_ms
        );
        Ok(index)
    }
}

fn relative_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Entries of `dir` sorted by name; unreadable entries are recorded against `dir`.
fn sorted_entries(
    root: &Path,
    dir: &Path,
    listing: impl IntoIterator<Item = io::Result<PathBuf>>,
    skipped: &mut Vec<SkippedItem>,
) -> Vec<PathBuf> {
    let mut entries = Vec::new();
    for entry in listing {
        match entry {
            Ok(path) => entries.push(path),
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                skipped.push(SkippedItem {
                    path: relative_id(root, dir),
                    reason: SkipReason::Failed(e.to_string()),
                });
            }
        }
    }
    entries.sort();
    entries
}

/// Depth-first, entries sorted by name. Symlinked directories are not descended.
fn walk(
    root: &Path,
    dir: &Path,
    files: &mut Vec<CollectionFile>,
    skipped: &mut Vec<SkippedItem>,
) -> Result<()> {
    let listing = fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
    let entries = sorted_entries(root, dir, listing, skipped);

    for path in entries {
        let id = relative_id(root, &path);
        let link = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                skipped.push(SkippedItem {
                    path: id,
                    reason: SkipReason::Failed(e.to_string()),
                });
                continue;
            }
        };

        if link.is_dir() {
            if let Err(e) = walk(root, &path, files, skipped) {
                warn!("Cannot read directory {}: {}", id, e);
                skipped.push(SkippedItem {
                    path: id,
                    reason: SkipReason::Failed(e.to_string()),
                });
            }
        } else if link.is_file() || fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            files.push(CollectionFile { id, path });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::PreprocessConfig;
    use image::{DynamicImage, Rgb, RgbImage};

    fn pipeline() -> Pipeline {
        Pipeline::from_config(PreprocessConfig {
            image_size: 16,
            ..Default::default()
        })
        .unwrap()
    }

    fn write_png(path: &Path, rgb: [u8; 3]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 12, Rgb(rgb)))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_relative_ids_use_forward_slashes() {
        let root = Path::new("/data/set");
        assert_eq!(relative_id(root, &root.join("fruit").join("a.png")), "fruit/a.png");
    }

    #[test]
    fn test_unreadable_entries_are_recorded() {
        let root = Path::new("/data/set");
        let dir = root.join("fruit");
        let listing = vec![
            Ok(dir.join("b.png")),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            Ok(dir.join("a.png")),
        ];
        let mut skipped = Vec::new();

        let entries = sorted_entries(root, &dir, listing, &mut skipped);

        assert_eq!(entries, vec![dir.join("a.png"), dir.join("b.png")]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].path, "fruit");
        assert!(matches!(&skipped[0].reason, SkipReason::Failed(msg) if msg.contains("denied")));
    }

    #[test]
    fn test_build_skips_non_images() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b/two.png"), [0, 255, 0]);
        write_png(&dir.path().join("a/one.png"), [255, 0, 0]);
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("a/fake.png"), [0u8, 1, 2, 3]).unwrap();

        let index = IndexBuilder::new(pipeline()).build(dir.path()).unwrap();

        let ids: Vec<&str> = index.items().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a/one.png", "b/two.png"]);

        let report = index.report();
        assert_eq!(report.files_seen, 4);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped_count(), 2);
        assert!(report
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::NotAnImage));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexBuilder::new(pipeline())
            .build(&dir.path().join("nope"))
            .unwrap();
        assert!(index.is_empty());
        assert_eq!(index.stamp(), &pipeline().stamp());
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.png");
        write_png(&file, [1, 1, 1]);
        assert!(matches!(
            IndexBuilder::new(pipeline()).build(&file),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["x.png", "y.png", "z/w.png"].iter().enumerate() {
            write_png(&dir.path().join(name), [i as u8 * 80, 10, 200]);
        }
        let builder = IndexBuilder::new(pipeline());
        let first = builder.build(dir.path()).unwrap();
        let second = builder.build(dir.path()).unwrap();
        for ((id_a, v_a), (id_b, v_b)) in first.items().zip(second.items()) {
            assert_eq!(id_a, id_b);
            assert_eq!(v_a, v_b);
        }
    }
}
