// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input expansion: directories become the image files directly inside them.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Extensions accepted as input images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "webp"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Expand `inputs` one directory level deep, keeping supported images only.
/// Directory contents are sorted so runs are reproducible.
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = match std::fs::read_dir(input) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %input.display(), error = %e, "cannot list directory");
                    continue;
                }
            };
            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_supported_image(path))
                .collect();
            files.sort();
            expanded.extend(files);
        } else if is_supported_image(input) {
            expanded.push(input.clone());
        } else {
            warn!(path = %input.display(), "not a supported image, skipped");
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert!(is_supported_image(Path::new("scan.TIF")));
        assert!(is_supported_image(Path::new("a/b/photo.jpeg")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("README")));
    }

    #[test]
    fn directories_expand_one_level() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.png", "a.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        std::fs::create_dir(dir.path().join("nested")).expect("mkdir");
        std::fs::write(dir.path().join("nested/c.png"), b"x").expect("write");

        let single = PathBuf::from("elsewhere/scan.tiff");
        let expanded = expand_inputs(&[dir.path().to_path_buf(), single.clone(), PathBuf::from("x.pdf")]);

        assert_eq!(
            expanded,
            vec![dir.path().join("a.jpg"), dir.path().join("b.png"), single]
        );
    }
}
