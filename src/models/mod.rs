pub mod identity;

pub use identity::{Detection, EncodedImage, Identity, IdentitySummary, Role};
