use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn write_page(path: &Path) {
    let mut image = RgbImage::from_pixel(1000, 1000, Rgb([255, 255, 255]));
    for y in 150..200 {
        for x in 150..250 {
            image.put_pixel(x, y, Rgb([0, 0, 0]));
        }
    }
    image.save(path).unwrap();
}

fn figcap(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("figcap").unwrap();
    cmd.env("HOME", home.path()).env("XDG_CONFIG_HOME", home.path());
    cmd
}

fn png_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
        .count()
}

#[test]
fn process_rewrites_tags() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("page.png");
    let text = dir.path().join("page.txt");
    let figures = dir.path().join("figures");
    write_page(&image);
    fs::write(
        &text,
        "Notes\n[CROP:100,100,300,300|Logo]\n[CROP:100,100,110,110|Speck]\nEnd",
    )
    .unwrap();

    figcap(&dir)
        .arg("process")
        .arg(&image)
        .arg("--text")
        .arg(&text)
        .arg("--out-dir")
        .arg(&figures)
        .assert()
        .success()
        .stdout(predicate::str::contains("[FIG_CAPTURE: fig_"))
        .stdout(predicate::str::contains("| Logo]"))
        .stdout(predicate::str::contains("CROP").not());

    assert_eq!(png_count(&figures), 1);
}

#[test]
fn process_json_reports_fates() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("page.png");
    let text = dir.path().join("page.txt");
    write_page(&image);
    fs::write(&text, "[CROP:100,100,110,110|Speck]").unwrap();

    figcap(&dir)
        .arg("process")
        .arg(&image)
        .arg("--text")
        .arg(&text)
        .arg("--out-dir")
        .arg(dir.path().join("figures"))
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"size_filtered\""));
}

#[test]
fn process_missing_image_fails() {
    let dir = TempDir::new().unwrap();
    let text = dir.path().join("page.txt");
    fs::write(&text, "").unwrap();

    figcap(&dir)
        .arg("process")
        .arg(dir.path().join("missing.png"))
        .arg("--text")
        .arg(&text)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Image file not found"));
}

#[test]
fn batch_joins_pages() {
    let dir = TempDir::new().unwrap();
    let figures = dir.path().join("figures");
    let note = dir.path().join("note.md");

    for (name, caption) in [("p1", "First"), ("p2", "Second")] {
        write_page(&dir.path().join(format!("{}.png", name)));
        fs::write(
            dir.path().join(format!("{}.txt", name)),
            format!("{}\n[CROP:100,100,300,300|{}]", name, caption),
        )
        .unwrap();
    }

    let pattern = dir.path().join("*.png");
    figcap(&dir)
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .arg("--out-dir")
        .arg(&figures)
        .arg("--output")
        .arg(&note)
        .assert()
        .success();

    let text = fs::read_to_string(&note).unwrap();
    assert!(text.starts_with("p1\n[FIG_CAPTURE: "));
    assert!(text.contains("| First]\n\np2\n[FIG_CAPTURE: "));
    assert!(text.ends_with("| Second]"));
    assert_eq!(png_count(&figures), 2);
}

#[test]
fn batch_continue_on_error_skips_missing_sidecar() {
    let dir = TempDir::new().unwrap();
    write_page(&dir.path().join("a.png"));
    write_page(&dir.path().join("b.png"));
    fs::write(dir.path().join("b.txt"), "[CROP:100,100,300,300|Only]").unwrap();

    let pattern = dir.path().join("*.png");

    figcap(&dir)
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .arg("--out-dir")
        .arg(dir.path().join("figures"))
        .assert()
        .failure();

    figcap(&dir)
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .arg("--out-dir")
        .arg(dir.path().join("figures"))
        .arg("--continue-on-error")
        .assert()
        .success()
        .stdout(predicate::str::contains("| Only]"))
        .stderr(predicate::str::contains("Failed pages:"));
}

#[test]
fn config_init_and_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("figcap.json");

    figcap(&dir)
        .args(["config", "init", "--output"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    figcap(&dir)
        .args(["config", "init", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    figcap(&dir)
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"min_iou\": 0.05"));
}
