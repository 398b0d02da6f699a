// ============================================================
// Layer 4 - MNIST idx File Loader
// ============================================================
// Loads the MNIST digit files in their original idx-ubyte format.
//
// How idx files work:
//   An idx file is a tiny binary container: a 32-bit big-endian
//   magic number describing the payload, one 32-bit count per
//   dimension, then the raw bytes.
//
//   train-images-idx3-ubyte:  magic 2051, [count, rows, cols], pixels
//   train-labels-idx1-ubyte:  magic 2049, [count], labels
//
// Pixels arrive as bytes 0..=255 and leave here scaled to [0, 1],
// one flat row-major Vec<f32> per image. Labels are checked to be
// digits so a corrupted file fails at load time, not mid-training.
//
// Reference: http://yann.lecun.com/exdb/mnist/
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::data::dataset::DigitItem;

/// Both presets consume 28x28 grayscale images.
pub const IMAGE_SIDE: usize = 28;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

/// The image/label file pair for one split of the dataset.
pub struct DigitFiles {
    pub images: PathBuf,
    pub labels: PathBuf,
}

impl DigitFiles {
    /// The 60k training split under `dir`, using the standard names.
    pub fn train(dir: &Path) -> Self {
        Self {
            images: dir.join("train-images-idx3-ubyte"),
            labels: dir.join("train-labels-idx1-ubyte"),
        }
    }

    /// The 10k test split under `dir`.
    pub fn test(dir: &Path) -> Self {
        Self {
            images: dir.join("t10k-images-idx3-ubyte"),
            labels: dir.join("t10k-labels-idx1-ubyte"),
        }
    }
}

/// Load one split, pairing every image with its label.
pub fn load_digits(files: &DigitFiles) -> Result<Vec<DigitItem>> {
    let images = read_images(&files.images)
        .with_context(|| format!("cannot read image file '{}'", files.images.display()))?;
    let labels = read_labels(&files.labels)
        .with_context(|| format!("cannot read label file '{}'", files.labels.display()))?;

    if images.len() != labels.len() {
        anyhow::bail!(
            "image file holds {} samples but label file holds {}",
            images.len(),
            labels.len()
        );
    }

    let items: Vec<DigitItem> = images
        .into_iter()
        .zip(labels)
        .map(|(pixels, label)| DigitItem { pixels, label })
        .collect();
    tracing::info!("Loaded {} digit samples", items.len());
    Ok(items)
}

fn read_images(path: &Path) -> Result<Vec<Vec<f32>>> {
    let mut file = BufReader::new(File::open(path)?);

    let magic = read_u32(&mut file)?;
    if magic != IMAGE_MAGIC {
        anyhow::bail!("bad magic number {magic}, expected an idx3 image file");
    }
    let count = read_u32(&mut file)? as usize;
    let rows = read_u32(&mut file)? as usize;
    let cols = read_u32(&mut file)? as usize;
    if rows != IMAGE_SIDE || cols != IMAGE_SIDE {
        anyhow::bail!("unsupported image size {rows}x{cols}, expected {IMAGE_SIDE}x{IMAGE_SIDE}");
    }

    let mut raw = vec![0u8; count * rows * cols];
    file.read_exact(&mut raw).context("image file is truncated")?;

    // Scale bytes to [0, 1]; the presets were sized for this range.
    let images = raw
        .chunks_exact(rows * cols)
        .map(|chunk| chunk.iter().map(|&byte| byte as f32 / 255.0).collect())
        .collect();
    Ok(images)
}

fn read_labels(path: &Path) -> Result<Vec<u8>> {
    let mut file = BufReader::new(File::open(path)?);

    let magic = read_u32(&mut file)?;
    if magic != LABEL_MAGIC {
        anyhow::bail!("bad magic number {magic}, expected an idx1 label file");
    }
    let count = read_u32(&mut file)? as usize;

    let mut labels = vec![0u8; count];
    file.read_exact(&mut labels).context("label file is truncated")?;

    if let Some(bad) = labels.iter().find(|&&label| label > 9) {
        anyhow::bail!("label {bad} is outside the digit range 0..=9");
    }
    Ok(labels)
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_be_bytes(bytes))
}
