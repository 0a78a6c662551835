//! Local entity cache.

mod memory;

pub use memory::MemoryCache;

use crate::entity::Entity;
use crate::error::CoreResult;
use crate::query::Query;

/// A local persistent store of entities for one collection, keyed by ID.
///
/// The cache is an opaque collaborator: the engine only relies on the
/// operations below. Implementations serialize their own internal access.
///
/// # Invariants
///
/// - Every stored entity has exactly one current ID
/// - `promote` removes the temporary record and inserts the server record
///   as one step
/// - `clear` and `delete_by_ids` never touch entities outside their scope
pub trait Cache<T: Entity>: Send + Sync {
    /// Returns the collection name.
    fn collection(&self) -> &str;

    /// Returns every cached entity.
    fn find_all(&self) -> CoreResult<Vec<T>>;

    /// Returns the entity with the given ID.
    fn find_by_id(&self, id: &str) -> CoreResult<Option<T>>;

    /// Returns the entities with the given IDs. Missing IDs are skipped.
    fn find_by_ids(&self, ids: &[String]) -> CoreResult<Vec<T>>;

    /// Returns the entities matching the query, modifiers applied.
    fn find_by_query(&self, query: &Query<T>) -> CoreResult<Vec<T>>;

    /// Inserts a new entity. Fails if the ID is missing or already cached.
    fn save(&self, entity: T) -> CoreResult<T>;

    /// Inserts or replaces an entity by ID.
    fn update(&self, entity: T) -> CoreResult<T>;

    /// Deletes the given IDs, returning how many were present.
    fn delete_by_ids(&self, ids: &[String]) -> CoreResult<usize>;

    /// Deletes every entity matching the query filter, or everything when
    /// `query` is `None`. Returns the number deleted.
    fn clear(&self, query: Option<&Query<T>>) -> CoreResult<usize>;

    /// Bulk upsert.
    fn refresh(&self, entities: &[T]) -> CoreResult<()>;

    /// Returns true if no entity is cached.
    fn is_empty(&self) -> CoreResult<bool>;

    /// Returns the number of cached entities.
    fn count(&self) -> CoreResult<usize>;

    /// Renames a record cached under `temp_id` to the ID carried by `entity`.
    ///
    /// The temporary record is removed and `entity` stored in its place.
    fn promote(&self, temp_id: &str, entity: T) -> CoreResult<T>;
}
