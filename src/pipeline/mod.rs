pub mod preprocess;
pub mod search; // Query → cache → render, with stale-response suppression
pub mod upload; // Sequential batch upload with progressive refresh

pub use preprocess::{DownsamplePreprocessor, ImagePreprocessor, MockPreprocessor, PreprocessConfig};
pub use search::{SearchController, SearchOutcome, SearchSummary};
pub use upload::{UploadOrchestrator, UploadOutcome};
