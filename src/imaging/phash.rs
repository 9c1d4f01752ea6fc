//! Perceptual hashing for the live-scan change gate. Two frames of the same
//! page hash close together even when the camera shakes a little.

use anyhow::Result;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// Hash an encoded frame (any format `image` can sniff) to a base64 string.
pub fn compute_phash(frame_bytes: &[u8]) -> Result<String> {
    let img = image::load_from_memory(frame_bytes)?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    Ok(hasher.hash_image(&img).to_base64())
}

/// Hamming distance between two base64 hashes. Unparseable input counts as
/// maximally distant so a corrupt hash never suppresses recognition.
pub fn compute_hamming_distance(lhs: &str, rhs: &str) -> u32 {
    let Ok(h1) = ImageHash::<Vec<u8>>::from_base64(lhs) else {
        return u32::MAX;
    };
    let Ok(h2) = ImageHash::<Vec<u8>>::from_base64(rhs) else {
        return u32::MAX;
    };
    h1.dist(&h2)
}
