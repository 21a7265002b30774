//! Taxonomy dimension repository trait.

use crate::error::MetadataResult;
use crate::models::DimensionRow;
use async_trait::async_trait;
use courier_core::DimensionKind;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for taxonomy dimensions (apps, channels, platforms, archs).
#[async_trait]
pub trait DimensionRepo: Send + Sync {
    /// Create a new dimension. Fails with `AlreadyExists` when the name is
    /// taken within the kind.
    async fn create_dimension(&self, dimension: &DimensionRow) -> MetadataResult<()>;

    /// List all dimensions of a kind, ordered by creation time.
    async fn list_dimensions(&self, kind: DimensionKind) -> MetadataResult<Vec<DimensionRow>>;

    /// Get a dimension by ID.
    async fn get_dimension(
        &self,
        kind: DimensionKind,
        dimension_id: Uuid,
    ) -> MetadataResult<Option<DimensionRow>>;

    /// Get a dimension by name.
    async fn get_dimension_by_name(
        &self,
        kind: DimensionKind,
        name: &str,
    ) -> MetadataResult<Option<DimensionRow>>;

    /// Count records of a kind. Drives the upload gating rule: a dimension
    /// becomes mandatory as soon as one record of its kind exists.
    async fn count_dimensions(&self, kind: DimensionKind) -> MetadataResult<u64>;

    /// Rename a dimension and rewrite the referencing field of every release
    /// or artifact in the same transaction. Both writes commit or both roll
    /// back.
    async fn rename_dimension(
        &self,
        kind: DimensionKind,
        dimension_id: Uuid,
        new_name: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete a dimension. Rejected with `Constraint` while any release or
    /// artifact still references its name. Returns the deleted row count.
    async fn delete_dimension(
        &self,
        kind: DimensionKind,
        dimension_id: Uuid,
    ) -> MetadataResult<u64>;
}
