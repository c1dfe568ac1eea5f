use figure_timer::catalog::{Catalog, FolderCount};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"x").unwrap();
}

fn library(root: &Path) -> (PathBuf, PathBuf) {
    let poses = root.join("poses");
    let hands = root.join("hands");
    touch(&poses.join("b.jpg"));
    touch(&poses.join("a.PNG"));
    touch(&poses.join("nested").join("c.webp"));
    touch(&poses.join("notes.txt"));
    touch(&poses.join(".cache").join("thumb.jpg"));
    touch(&hands.join("z.bmp"));
    touch(&hands.join("y.gif"));
    touch(&hands.join("x.jpeg"));
    (poses, hands)
}

#[test]
fn sorted_build_is_lexicographic_and_deterministic() {
    let tmp = tempdir().unwrap();
    let (poses, hands) = library(tmp.path());
    let folders = vec![poses.clone(), hands.clone()];

    let first = Catalog::build(&folders, false, &mut StdRng::seed_from_u64(1));
    let second = Catalog::build(&folders, false, &mut StdRng::seed_from_u64(99));

    let mut expected = first.as_slice().to_vec();
    expected.sort();
    assert_eq!(first.as_slice(), expected.as_slice());
    assert_eq!(first.as_slice(), second.as_slice());
    assert_eq!(first.len(), 6);
    assert!(
        first
            .as_slice()
            .iter()
            .all(|p| !p.to_string_lossy().contains(".cache")),
        "hidden directories must be skipped"
    );
    assert!(
        !first
            .as_slice()
            .iter()
            .any(|p| p.ends_with("notes.txt"))
    );
}

#[test]
fn shuffled_build_is_a_permutation_for_any_seed() {
    let tmp = tempdir().unwrap();
    let (poses, hands) = library(tmp.path());
    let folders = vec![poses, hands];
    let sorted = Catalog::build(&folders, false, &mut StdRng::seed_from_u64(0));

    for seed in [0u64, 1, 7, 42, 1234] {
        let shuffled = Catalog::build(&folders, true, &mut StdRng::seed_from_u64(seed));
        let mut entries = shuffled.as_slice().to_vec();
        assert_eq!(entries.len(), sorted.len());
        entries.sort();
        assert_eq!(entries.as_slice(), sorted.as_slice(), "seed {seed}");
    }
}

#[test]
fn reports_per_folder_counts_and_skips_missing_folders() {
    let tmp = tempdir().unwrap();
    let (poses, hands) = library(tmp.path());
    let missing = tmp.path().join("gone");
    let folders = vec![poses.clone(), missing.clone(), hands.clone()];

    let catalog = Catalog::build(&folders, true, &mut StdRng::seed_from_u64(5));
    assert_eq!(
        catalog.folder_counts(),
        &[
            FolderCount {
                folder: poses,
                images: 3
            },
            FolderCount {
                folder: missing,
                images: 0
            },
            FolderCount {
                folder: hands,
                images: 3
            },
        ]
    );
    assert_eq!(catalog.len(), 6);
}

#[test]
fn folders_without_images_give_an_empty_catalog() {
    let tmp = tempdir().unwrap();
    touch(&tmp.path().join("readme.md"));
    let catalog = Catalog::build(
        &[tmp.path().to_path_buf()],
        false,
        &mut StdRng::seed_from_u64(0),
    );
    assert!(catalog.is_empty());
}
