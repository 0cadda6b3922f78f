//! Generic create/read/update/delete dispatch over any [`Entity`] kind.
//!
//! [`Crud`] is written once against the [`Entity`] capability set and serves every
//! registered kind. Every write path runs the entity's pre-write hook, normalization and
//! validation for *all* affected documents before the first byte is written, so a failing
//! constraint never leaves a partial mutation behind.
//!
//! # Update dispatch
//!
//! An [`UpdateRequest`] may carry an id, a filter, a field patch and a lifecycle method.
//! They are resolved in this order:
//!
//! 1. **method** (requires an id): the entity matching the id (and the filter, if any) is
//!    loaded, the method is applied, then the patch if one is present, and the whole entity
//!    is written back.
//! 2. **patch + id**: the patch is applied to that one entity; a filter, if present, must
//!    match it too.
//! 3. **patch + filter**: the patch is applied to every matching entity.
//!
//! Anything else (no method and no patch, a method without an id, a patch without an id or
//! a filter) is rejected with [`DocumentStoreError::InvalidUpdate`].
//!
//! Both paths read, then write. They are not atomic: a concurrent writer can change the
//! entity between the two steps, and the later write wins for the fields it touches. The
//! patch paths only write fields that changed, so writers of disjoint fields do not clobber
//! each other; the method path rewrites the whole entity.
//!
//! A patch over several entities is validated in full, then handed to the backend as one
//! change set. If the backend rejects it, the fields that were to change are written back
//! to the values read at the start, so a failed patch leaves no partial mutation on
//! backends that apply change sets one by one.
//!
//! Fields named by [`IMMUTABLE_FIELDS`] and by [`Entity::immutable_fields`] cannot be
//! patched.

use bson::{Bson, DateTime, Document as FieldMap, Uuid};
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::{DocumentExt, ID_FIELD},
    entity::{Entity, EntityMethod, WriteEvent},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PageRequest},
    query::{Expr, Filter, Query, Sort},
};

/// Fields a patch may never touch, for any kind. See also [`Entity::immutable_fields`].
pub const IMMUTABLE_FIELDS: [&str; 2] = [ID_FIELD, "created_at"];

/// Input of [`Crud::create`]: one field map, or a batch of them.
#[derive(Debug, Clone)]
pub enum CreateInput {
    One(FieldMap),
    Many(Vec<FieldMap>),
}

impl From<FieldMap> for CreateInput {
    fn from(fields: FieldMap) -> Self {
        CreateInput::One(fields)
    }
}

impl From<Vec<FieldMap>> for CreateInput {
    fn from(batch: Vec<FieldMap>) -> Self {
        CreateInput::Many(batch)
    }
}

/// Output of [`Crud::create`], mirroring the shape of the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Created<E> {
    One(E),
    Many(Vec<E>),
}

impl<E> Created<E> {
    /// Flattens the result into a list.
    pub fn into_vec(self) -> Vec<E> {
        match self {
            Created::One(entity) => vec![entity],
            Created::Many(entities) => entities,
        }
    }
}

/// What [`Crud::delete`] removes.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    /// At most the one entity with this id.
    Id(Uuid),
    /// Every entity matching the filter.
    Filter(Expr),
}

/// Arguments of [`Crud::update`]. See the [module docs](self) for the dispatch order.
#[derive(Debug, Clone)]
pub struct UpdateRequest<E: Entity> {
    id: Option<Uuid>,
    filter: Option<Expr>,
    patch: Option<FieldMap>,
    method: Option<E::Method>,
}

impl<E: Entity> Default for UpdateRequest<E> {
    fn default() -> Self {
        Self { id: None, filter: None, patch: None, method: None }
    }
}

impl<E: Entity> UpdateRequest<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request targeting the entity with `id`.
    pub fn by_id(id: Uuid) -> Self {
        Self::new().with_id(id)
    }

    /// A request targeting every entity matching `filter`.
    pub fn matching(filter: Expr) -> Self {
        Self::new().with_filter(filter)
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the fields to change, keyed by stored field name.
    pub fn patch(mut self, fields: FieldMap) -> Self {
        self.patch = Some(fields);
        self
    }

    /// Invokes a lifecycle method on the target entity.
    pub fn invoke(mut self, method: E::Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Invokes a lifecycle method given by name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownMethod`] if `E` has no method with that name.
    pub fn invoke_named(self, name: &str) -> DocumentStoreResult<Self> {
        Ok(self.invoke(name.parse()?))
    }
}

/// Generic CRUD dispatcher for the entity kind `E`.
///
/// Obtained from [`DocumentStore::crud`](crate::store::DocumentStore::crud).
#[derive(Debug)]
pub struct Crud<'a, B: StoreBackend, E: Entity> {
    collection: TypedCollection<'a, B, E>,
}

impl<'a, B: StoreBackend, E: Entity> Crud<'a, B, E> {
    pub(crate) fn new(collection: TypedCollection<'a, B, E>) -> Self {
        Self { collection }
    }

    /// The raw collection underneath, without hooks or validation.
    pub fn collection(&self) -> &TypedCollection<'a, B, E> {
        &self.collection
    }

    /// Builds, validates and inserts one entity or a batch of entities from field maps.
    ///
    /// Field maps may not carry an `id`; identifiers are assigned here.
    ///
    /// # Errors
    ///
    /// Returns the first validation or store error. A failed batch persists nothing.
    pub async fn create(&self, input: impl Into<CreateInput>) -> DocumentStoreResult<Created<E>> {
        match input.into() {
            CreateInput::One(fields) => Ok(Created::One(self.create_one(fields).await?)),
            CreateInput::Many(batch) => Ok(Created::Many(self.create_many(batch).await?)),
        }
    }

    /// Builds, validates and inserts one entity from a field map.
    pub async fn create_one(&self, fields: FieldMap) -> DocumentStoreResult<E> {
        Ok(self
            .insert_many(vec![Self::build(fields)?])
            .await?
            .remove(0))
    }

    /// Builds, validates and inserts a batch of entities, all or nothing.
    pub async fn create_many(&self, batch: Vec<FieldMap>) -> DocumentStoreResult<Vec<E>> {
        self.insert_many(
            batch
                .into_iter()
                .map(Self::build)
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        )
        .await
    }

    /// Validates and inserts an already constructed entity.
    pub async fn insert(&self, entity: E) -> DocumentStoreResult<E> {
        Ok(self
            .insert_many(vec![entity])
            .await?
            .remove(0))
    }

    /// Validates and inserts a batch of constructed entities, all or nothing.
    ///
    /// Every entity is hooked and validated before anything is written, and a batch
    /// reusing the id of a stored entity is rejected up front. If the backend then fails
    /// part way through the insert, the ids of the batch are deleted again before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentAlreadyExists`] if an entity of the batch has
    /// the id of a stored one.
    pub async fn insert_many(&self, mut entities: Vec<E>) -> DocumentStoreResult<Vec<E>> {
        if entities.is_empty() {
            return Ok(entities);
        }

        let now = DateTime::now();
        for entity in entities.iter_mut() {
            entity.prepare(WriteEvent::Insert, now)?;
        }

        let ids = entities
            .iter()
            .map(|entity| *entity.id())
            .collect::<Vec<_>>();

        // The rollback below may only remove ids this call wrote.
        let stored = self.collection.get(ids.clone()).await?;
        if let Some(existing) = stored.first() {
            return Err(DocumentStoreError::DocumentAlreadyExists(
                existing.id().to_string(),
                E::collection_name().to_string(),
            ));
        }

        if let Err(err) = self.collection.insert(&entities).await {
            warn!(
                collection = E::collection_name(),
                batch = ids.len(),
                error = %err,
                "Batch insert failed, rolling back"
            );

            if let Err(rollback_err) = self.collection.delete(ids).await {
                warn!(
                    collection = E::collection_name(),
                    error = %rollback_err,
                    "Rollback of failed batch insert failed"
                );
            }

            return Err(err);
        }

        debug!(collection = E::collection_name(), count = entities.len(), "Inserted entities");

        Ok(entities)
    }

    /// Fetches the entity with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if no entity has that id.
    pub async fn get(&self, id: Uuid) -> DocumentStoreResult<E> {
        self.collection
            .find_by_id(id)
            .await?
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(
                id.to_string(),
                E::collection_name().to_string(),
            ))
    }

    /// Fetches the first entity matching `filter`, if any.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<E>> {
        self.collection.find_one(filter).await
    }

    /// Fetches every entity matching `filter`, optionally sorted.
    pub async fn find(&self, filter: Expr, sort: Option<Sort>) -> DocumentStoreResult<Vec<E>> {
        self.collection
            .query(Query::builder().filter(filter).maybe_sort(sort).build())
            .await
    }

    /// Counts the entities matching `filter`; `None` counts every entity.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.collection.count(filter).await
    }

    /// Returns one page of the entities matching `filter` in the backend's default order.
    pub async fn paginate(
        &self,
        request: PageRequest,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<Page<E>> {
        self.collection
            .paginate(request, filter, None)
            .await
    }

    /// Returns one page of the entities matching `filter`, in the given order.
    pub async fn paginate_sorted(
        &self,
        request: PageRequest,
        filter: Option<Expr>,
        sort: Sort,
    ) -> DocumentStoreResult<Page<E>> {
        self.collection
            .paginate(request, filter, Some(sort))
            .await
    }

    /// Applies an update request. See the [module docs](self) for the dispatch order.
    ///
    /// # Returns
    ///
    /// `true` if at least one entity was modified, `false` if nothing matched.
    pub async fn update(&self, request: UpdateRequest<E>) -> DocumentStoreResult<bool> {
        let UpdateRequest { id, filter, patch, method } = request;
        let patch = patch.filter(|fields| !fields.is_empty());

        if let Some(fields) = &patch {
            Self::check_patch(fields)?;
        }

        match (method, id, patch) {
            (Some(method), Some(id), patch) => {
                self.invoke_on(Self::target(id, filter), method, patch)
                    .await
            }
            (Some(method), None, _) => Err(DocumentStoreError::InvalidUpdate(format!(
                "method '{}' on {} needs an id",
                method.name(),
                E::collection_name(),
            ))),
            (None, Some(id), Some(fields)) => {
                self.patch_matching(Self::target(id, filter), Some(1), fields)
                    .await
            }
            (None, None, Some(fields)) => match filter {
                Some(filter) => self.patch_matching(filter, None, fields).await,
                None => Err(DocumentStoreError::InvalidUpdate(format!(
                    "patch on {} needs an id or a filter",
                    E::collection_name(),
                ))),
            },
            (None, _, None) => Err(DocumentStoreError::InvalidUpdate(format!(
                "update on {} needs a non-empty patch or a method",
                E::collection_name(),
            ))),
        }
    }

    /// Patches the entity with `id`.
    pub async fn patch(&self, id: Uuid, fields: FieldMap) -> DocumentStoreResult<bool> {
        self.update(UpdateRequest::by_id(id).patch(fields))
            .await
    }

    /// Patches every entity matching `filter`.
    pub async fn patch_many(&self, filter: Expr, fields: FieldMap) -> DocumentStoreResult<bool> {
        self.update(UpdateRequest::matching(filter).patch(fields))
            .await
    }

    /// Invokes the lifecycle method called `method` on the entity with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownMethod`] if `E` has no such method.
    pub async fn invoke(&self, id: Uuid, method: &str) -> DocumentStoreResult<bool> {
        self.update(UpdateRequest::by_id(id).invoke_named(method)?)
            .await
    }

    /// Deletes the entity with the given id, or every entity matching a filter.
    ///
    /// # Returns
    ///
    /// `true` if at least one entity was deleted.
    pub async fn delete(&self, target: DeleteTarget) -> DocumentStoreResult<bool> {
        let deleted = match target {
            DeleteTarget::Id(id) => self.collection.delete(vec![id]).await?,
            DeleteTarget::Filter(filter) => self.collection.delete_matching(filter).await?,
        };

        debug!(collection = E::collection_name(), deleted, "Deleted entities");

        Ok(deleted > 0)
    }

    fn target(id: Uuid, filter: Option<Expr>) -> Expr {
        match filter {
            Some(filter) => Filter::id(id).and(filter),
            None => Filter::id(id),
        }
    }

    fn build(mut fields: FieldMap) -> DocumentStoreResult<E> {
        if fields.contains_key(ID_FIELD) {
            return Err(DocumentStoreError::Validation(format!(
                "`{ID_FIELD}` is assigned by the store and cannot be supplied for {}",
                E::collection_name(),
            )));
        }

        fields.insert(ID_FIELD, Uuid::new());

        Self::decode(fields)
    }

    fn decode(fields: FieldMap) -> DocumentStoreResult<E> {
        E::from_bson(Bson::Document(fields))
            .map_err(|err| DocumentStoreError::Validation(format!(
                "{}: {err}",
                E::collection_name(),
            )))
    }

    fn check_patch(fields: &FieldMap) -> DocumentStoreResult<()> {
        match fields.keys().find(|key| {
            IMMUTABLE_FIELDS.contains(&key.as_str()) || E::immutable_fields().contains(&key.as_str())
        }) {
            Some(key) => Err(DocumentStoreError::Validation(format!(
                "`{key}` of {} cannot be changed",
                E::collection_name(),
            ))),
            None => Ok(()),
        }
    }

    fn apply_patch(entity: &E, fields: &FieldMap) -> DocumentStoreResult<E> {
        let mut current = entity.to_field_map()?;

        for (key, value) in fields {
            if !current.contains_key(key) {
                return Err(DocumentStoreError::Validation(format!(
                    "{} has no field `{key}`",
                    E::collection_name(),
                )));
            }

            current.insert(key.clone(), value.clone());
        }

        Self::decode(current)
    }

    async fn invoke_on(
        &self,
        target: Expr,
        method: E::Method,
        patch: Option<FieldMap>,
    ) -> DocumentStoreResult<bool> {
        let Some(mut entity) = self.collection.find_one(target).await? else {
            return Ok(false);
        };

        method.apply(&mut entity);

        if let Some(fields) = &patch {
            entity = Self::apply_patch(&entity, fields)?;
        }

        entity.prepare(WriteEvent::Update, DateTime::now())?;

        let replaced = self.collection
            .replace(std::slice::from_ref(&entity))
            .await?;

        debug!(
            collection = E::collection_name(),
            id = %entity.id(),
            method = method.name(),
            replaced,
            "Invoked entity method"
        );

        Ok(replaced > 0)
    }

    async fn patch_matching(
        &self,
        filter: Expr,
        limit: Option<usize>,
        fields: FieldMap,
    ) -> DocumentStoreResult<bool> {
        let mut query = Query::builder().filter(filter);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let entities = self.collection
            .query(query.build())
            .await?;

        let now = DateTime::now();
        let mut changes = Vec::with_capacity(entities.len());
        let mut restores = Vec::with_capacity(entities.len());

        for entity in &entities {
            let before = entity.to_field_map()?;
            let mut patched = Self::apply_patch(entity, &fields)?;
            patched.prepare(WriteEvent::Update, now)?;

            let changed = patched
                .to_field_map()?
                .into_iter()
                .filter(|(key, value)| before.get(key) != Some(value))
                .collect::<FieldMap>();

            if !changed.is_empty() {
                let restore = changed
                    .keys()
                    .map(|key| (key.clone(), before.get(key).cloned().unwrap_or(Bson::Null)))
                    .collect::<FieldMap>();

                changes.push((*entity.id(), changed));
                restores.push((*entity.id(), restore));
            }
        }

        if changes.is_empty() {
            return Ok(false);
        }

        let modified = match self.collection.set_many(changes).await {
            Ok(modified) => modified,
            Err(err) => {
                warn!(
                    collection = E::collection_name(),
                    batch = restores.len(),
                    error = %err,
                    "Patch failed, restoring patched fields"
                );

                if let Err(restore_err) = self.collection.set_many(restores).await {
                    warn!(
                        collection = E::collection_name(),
                        error = %restore_err,
                        "Restoring patched fields failed"
                    );
                }

                return Err(err);
            }
        };

        debug!(
            collection = E::collection_name(),
            matched = entities.len(),
            modified,
            "Patched entities"
        );

        Ok(modified > 0)
    }
}
