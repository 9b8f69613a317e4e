use crate::data::pair::DataPair;
use crate::error::{Error, Result};

fn corrupt(msg: String) -> Error {
    Error::DatasetUnavailable { msg, source: None }
}

fn be_u32(bytes: &[u8], at: usize) -> usize {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
}

/// Checks the 4-byte IDX magic: two zero bytes, dtype `0x08` (uint8) and the
/// expected number of dimensions.
fn check_magic(bytes: &[u8], dims: u8, what: &str) -> Result<()> {
    let header_len = 4 + 4 * dims as usize;
    if bytes.len() < header_len {
        return Err(corrupt(format!(
            "IDX {} file too short: expected at least {} header bytes, got {}",
            what, header_len, bytes.len()
        )));
    }
    if bytes[0] != 0x00 || bytes[1] != 0x00 {
        return Err(corrupt(format!(
            "IDX {} file: bytes 0-1 must be 0x00 0x00, got 0x{:02X} 0x{:02X}",
            what, bytes[0], bytes[1]
        )));
    }
    if bytes[2] != 0x08 {
        return Err(corrupt(format!(
            "IDX {} file: dtype must be 0x08 (uint8), got 0x{:02X}",
            what, bytes[2]
        )));
    }
    if bytes[3] != dims {
        return Err(corrupt(format!(
            "IDX {} file: expected {} dimensions, got {}",
            what, dims, bytes[3]
        )));
    }
    Ok(())
}

/// Parses a pair of IDX files (image + label) as used by MNIST.
///
/// # IDX3 image file layout
/// ```text
/// bytes  0-1:   0x00 0x00   (reserved)
/// byte   2:     0x08        (dtype = uint8)
/// byte   3:     0x03        (number of dimensions)
/// bytes  4-7:   N           (number of images, big-endian u32)
/// bytes  8-11:  rows        (big-endian u32)
/// bytes 12-15:  cols        (big-endian u32)
/// bytes 16..:   N * rows * cols bytes, row-major
/// ```
///
/// # IDX1 label file layout
/// ```text
/// bytes  0-3:   0x00 0x00 0x08 0x01
/// bytes  4-7:   N           (number of labels, big-endian u32)
/// bytes  8..:   N bytes, each a class index in [0, n_classes)
/// ```
///
/// Pixels are divided by 255 so inputs lie in `[0, 1]`; labels become one-hot
/// targets of length `n_classes`.
pub fn parse_idx_pair(
    image_bytes: &[u8],
    label_bytes: &[u8],
    n_classes: usize,
) -> Result<Vec<DataPair>> {
    check_magic(image_bytes, 3, "image")?;
    check_magic(label_bytes, 1, "label")?;

    let n_items = be_u32(image_bytes, 4);
    let rows = be_u32(image_bytes, 8);
    let cols = be_u32(image_bytes, 12);

    let n_pixels = rows.checked_mul(cols).ok_or_else(|| {
        corrupt(format!("IDX image file: rows * cols overflows (rows={}, cols={})", rows, cols))
    })?;
    let data_len = n_items.checked_mul(n_pixels).ok_or_else(|| {
        corrupt(format!(
            "IDX image file: n_items * n_pixels overflows (n_items={}, n_pixels={})",
            n_items, n_pixels
        ))
    })?;
    if image_bytes.len() < 16 + data_len {
        return Err(corrupt(format!(
            "IDX image file too short: header declares {} items of {}×{} pixels, \
             but file is only {} bytes",
            n_items, rows, cols, image_bytes.len()
        )));
    }

    let label_count = be_u32(label_bytes, 4);
    if label_count != n_items {
        return Err(corrupt(format!(
            "IDX file mismatch: image file declares {} items but label file declares {}",
            n_items, label_count
        )));
    }
    if label_bytes.len() < 8 + n_items {
        return Err(corrupt(format!(
            "IDX label file too short: header declares {} labels but file is only {} bytes",
            n_items, label_bytes.len()
        )));
    }

    let images = image_bytes[16..16 + data_len].chunks_exact(n_pixels.max(1));
    let labels = &label_bytes[8..8 + n_items];

    let mut pairs = Vec::with_capacity(n_items);
    for (i, (chunk, &class)) in images.zip(labels).enumerate() {
        let class = class as usize;
        if class >= n_classes {
            return Err(corrupt(format!(
                "IDX label at index {}: class {} is out of range for {} classes",
                i, class, n_classes
            )));
        }
        let input = chunk.iter().map(|&px| px as f64 / 255.0).collect();
        pairs.push(DataPair::labelled(input, class, n_classes));
    }

    Ok(pairs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds an IDX3/IDX1 pair of `rows × cols` images.
    pub(crate) fn idx_files(images: &[Vec<u8>], labels: &[u8], rows: u32, cols: u32) -> (Vec<u8>, Vec<u8>) {
        let mut img = vec![0, 0, 0x08, 0x03];
        img.extend((images.len() as u32).to_be_bytes());
        img.extend(rows.to_be_bytes());
        img.extend(cols.to_be_bytes());
        for image in images {
            img.extend(image);
        }
        let mut lbl = vec![0, 0, 0x08, 0x01];
        lbl.extend((labels.len() as u32).to_be_bytes());
        lbl.extend(labels);
        (img, lbl)
    }

    #[test]
    fn decodes_pixels_and_labels() {
        let (img, lbl) = idx_files(&[vec![0, 255, 51, 0], vec![255; 4]], &[3, 0], 2, 2);
        let pairs = parse_idx_pair(&img, &lbl, 10).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].input, vec![0.0, 1.0, 0.2, 0.0]);
        assert_eq!(pairs[0].target[3], 1.0);
        assert_eq!(pairs[0].target.iter().sum::<f64>(), 1.0);
        assert_eq!(pairs[1].target[0], 1.0);
    }

    #[test]
    fn rejects_bad_headers() {
        let (mut img, lbl) = idx_files(&[vec![0; 4]], &[1], 2, 2);
        img[3] = 0x02;
        assert!(parse_idx_pair(&img, &lbl, 10).is_err());
        assert!(parse_idx_pair(&[0, 0, 8], &lbl, 10).is_err());
    }

    #[test]
    fn rejects_count_mismatch_and_bad_labels() {
        let (img, lbl) = idx_files(&[vec![0; 4]], &[1, 2], 2, 2);
        assert!(parse_idx_pair(&img, &lbl, 10).is_err());
        let (img, lbl) = idx_files(&[vec![0; 4]], &[12], 2, 2);
        assert!(parse_idx_pair(&img, &lbl, 10).is_err());
    }

    #[test]
    fn rejects_truncated_pixels() {
        let (mut img, lbl) = idx_files(&[vec![0; 4]], &[1], 2, 2);
        img.pop();
        assert!(parse_idx_pair(&img, &lbl, 10).is_err());
    }
}
