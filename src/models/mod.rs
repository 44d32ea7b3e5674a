pub mod gallery_image;
pub mod query;
pub mod source;
pub mod upload;

pub use gallery_image::{GalleryImage, OcrStatus};
pub use query::Query;
pub use source::{SourceFile, TransmitUnit};
pub use upload::{UploadErrorDescriptor, UploadResponse, UploadedImage};

use serde::{Deserialize, Deserializer};

/// Treat a JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
