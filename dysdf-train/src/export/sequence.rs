//! Assembling numbered PNG frames into an animation.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use regex::Regex;
use tracing::{info, warn};

use crate::error::Result;

fn frame_regex() -> &'static Regex {
    static MEM: OnceLock<Regex> = OnceLock::new();
    MEM.get_or_init(|| Regex::new(r"^(\d+)\.png$").expect("frame pattern is a valid regex"))
}

/// Files in `dir` named `<number>.png`, ordered by that number.
pub fn collect_sequence_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = frame_regex();
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = pattern.captures(name) {
            if let Ok(number) = caps[1].parse::<u64>() {
                frames.push((number, entry.path()));
            }
        }
    }
    frames.sort_by_key(|(number, _)| *number);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Encode the numbered frames of `dir` into a looping GIF at `output`.
///
/// Returns the number of frames written. An empty directory writes nothing.
pub fn save_image_sequence(dir: &Path, output: &Path, fps: u32) -> Result<usize> {
    let paths = collect_sequence_frames(dir)?;
    if paths.is_empty() {
        warn!("No frames found in {}, skipping sequence", dir.display());
        return Ok(0);
    }

    let delay = Delay::from_numer_denom_ms(1000, fps.max(1));
    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        let rgba = image::open(path)?.to_rgba8();
        frames.push(Frame::from_parts(rgba, 0, 0, delay));
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut encoder = GifEncoder::new(BufWriter::new(File::create(output)?));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames)?;

    info!(
        "Wrote {} frame sequence at {} fps to {}",
        paths.len(),
        fps,
        output.display()
    );
    Ok(paths.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frame(dir: &Path, name: &str, value: u8) {
        RgbImage::from_pixel(4, 3, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_frames_sorted_numerically() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["10.png", "2.png", "000001.png"] {
            write_frame(tmp.path(), name, 0);
        }
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        write_frame(tmp.path(), "grid_3.png", 0);

        let frames = collect_sequence_frames(tmp.path()).unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["000001.png", "2.png", "10.png"]);
    }

    #[test]
    fn test_frame_pattern_is_anchored() {
        let pattern = frame_regex();
        assert!(std::ptr::eq(pattern, frame_regex()));
        assert!(pattern.is_match("000012.png"));
        assert!(!pattern.is_match("it000012.png"));
        assert!(!pattern.is_match("12.png.partial"));
    }

    #[test]
    fn test_gif_written() {
        let tmp = tempfile::tempdir().unwrap();
        let frames = tmp.path().join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        write_frame(&frames, "0.png", 10);
        write_frame(&frames, "1.png", 200);

        let out = tmp.path().join("seq/out.gif");
        let n = save_image_sequence(&frames, &out, 30).unwrap();
        assert_eq!(n, 2);
        let decoded = image::open(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_empty_dir_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out.gif");
        assert_eq!(save_image_sequence(tmp.path(), &out, 30).unwrap(), 0);
        assert!(!out.exists());
    }
}
