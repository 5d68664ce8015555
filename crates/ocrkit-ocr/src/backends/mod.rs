pub mod mock;

#[cfg(feature = "engine-tesseract")]
pub mod tesseract;
