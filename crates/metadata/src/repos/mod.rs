//! Repository traits for metadata entities.

pub mod dimensions;
pub mod releases;
pub mod users;

pub use dimensions::DimensionRepo;
pub use releases::{ReleasePatch, ReleaseRepo, UploadRecord};
pub use users::UserRepo;
