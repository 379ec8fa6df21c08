//! Frame presenter for the CLI.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use log::debug;

use glimpse_core::Presenter;

/// Headless presenter that counts frames and can persist them as PNGs.
///
/// Rendered overlays are the loop's product; without a preview window the
/// CLI either discards them (dry-run pacing) or writes them into a directory
/// for inspection.
#[derive(Debug)]
pub struct FrameSink {
    output_dir: Option<PathBuf>,
    frames_shown: u64,
}

impl FrameSink {
    pub fn new(output_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = output_dir.as_ref() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        }
        Ok(Self {
            output_dir,
            frames_shown: 0,
        })
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Presenter for FrameSink {
    fn show(&mut self, image: &RgbImage) -> Result<()> {
        if let Some(dir) = self.output_dir.as_ref() {
            let path = dir.join(format!("frame_{:06}.png", self.frames_shown));
            image
                .save(&path)
                .with_context(|| format!("failed to save frame to {}", path.display()))?;
            debug!("saved annotated frame to {}", path.display());
        }
        self.frames_shown += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counts_without_an_output_directory() {
        let mut sink = FrameSink::new(None).unwrap();
        let image = RgbImage::new(4, 4);
        sink.show(&image).unwrap();
        sink.show(&image).unwrap();
        assert_eq!(sink.frames_shown(), 2);
    }

    #[test]
    fn writes_sequentially_numbered_frames() {
        let dir = tempdir().unwrap();
        let mut sink = FrameSink::new(Some(dir.path().to_path_buf())).unwrap();
        let image = RgbImage::new(4, 4);
        sink.show(&image).unwrap();
        sink.show(&image).unwrap();

        assert!(dir.path().join("frame_000000.png").exists());
        assert!(dir.path().join("frame_000001.png").exists());
    }

    #[test]
    fn unwritable_directory_surfaces_an_error() {
        let dir = tempdir().unwrap();
        let mut sink = FrameSink::new(Some(dir.path().to_path_buf())).unwrap();
        // Remove the directory after creation so the save fails.
        fs::remove_dir_all(dir.path()).unwrap();

        let image = RgbImage::new(4, 4);
        assert!(sink.show(&image).is_err());
    }
}
