//! Declarative component queries ("signatures") compiled into per-table access plans.
//!
//! A [`Query`] owns a [`Signature`] and the list of tables it currently matches. New tables
//! are offered to every live query via [`Query::match_table`]; a query created after tables
//! already exist is populated by offering it every existing table in creation order, so the
//! two code paths converge on the same matched set.

pub mod matched;
mod matcher;
pub mod signature;

use crate::component::ComponentMetadata;
use crate::entity::{Entity, EntityIndex};
use crate::prefab::{PrefabIndex, PrefabResolver};
use crate::storage::{Storage, Table};
use crate::types::TypeInterner;

pub use matched::{MatchedTable, PlanSlot, Reference};
pub use matcher::MatchContext;
pub use signature::{Operator, Signature, SignatureColumn, SourceKind, Target};

/// A compiled signature plus the tables it currently matches.
pub struct Query {
    signature: Signature,
    /// The system this query belongs to, used to resolve `SourceKind::System` columns.
    owner: Option<Entity>,
    matched: Vec<MatchedTable>,
    has_refs: bool,
}

impl Query {
    /// Create a query from an already-preprocessed signature and offer it every table that
    /// exists in `storage`, in discovery (iteration) order.
    pub fn new(signature: Signature, owner: Option<Entity>, storage: &Storage, ctx: &MatchContext) -> Self {
        let mut query = Self {
            signature,
            owner,
            matched: Vec::new(),
            has_refs: false,
        };
        for (_, table) in storage.iter() {
            query.try_match(table, ctx);
        }
        query
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn matched_tables(&self) -> &[MatchedTable] {
        &self.matched
    }

    pub fn has_refs(&self) -> bool {
        self.has_refs
    }

    /// Offer a newly created table to this query. Returns `true` if it was added.
    ///
    /// A matched table record exists for a given table in at most one entry: a table
    /// already present is never re-added.
    pub fn match_table(&mut self, table: &Table, ctx: &MatchContext) -> bool {
        if self.matched.iter().any(|m| m.type_id == table.type_id()) {
            return false;
        }
        self.try_match(table, ctx)
    }

    fn try_match(&mut self, table: &Table, ctx: &MatchContext) -> bool {
        if !matcher::match_table(&self.signature, table, ctx) {
            return false;
        }
        let (record, _to_watch) = matcher::compile_plan(&self.signature, table, ctx, self.owner);
        self.has_refs |= !record.references.is_empty();
        self.matched.push(record);
        true
    }

    /// Re-resolve every matched table's reference pointers against current storage:
    /// required after any structural change observed via the should-resolve/generation
    /// protocol, before a system's next iteration.
    pub fn resolve_references(&mut self, entities: &dyn EntityIndex, storage: &Storage) {
        for record in &mut self.matched {
            for reference in &mut record.references {
                reference.cached_ptr = None;
                let Some((type_id, row)) = entities.get_row(reference.entity) else {
                    continue;
                };
                let Some(table) = storage.get(type_id) else {
                    continue;
                };
                let Some(idx) = table.ty().index_of(reference.component) else {
                    continue;
                };
                let Some(column) = table.column(idx) else {
                    continue;
                };
                if column.is_tag() {
                    continue;
                }
                reference.cached_ptr = Some(column.ptr_at(row));
            }
        }
    }
}

/// Convenience bundle of the collaborators a world needs to build a [`MatchContext`].
pub fn context<'a>(
    entities: &'a dyn EntityIndex,
    metadata: &'a dyn ComponentMetadata,
    interner: &'a dyn TypeInterner,
    prefabs: &'a dyn PrefabIndex,
    prefab_resolver: &'a dyn PrefabResolver,
) -> MatchContext<'a> {
    MatchContext {
        entities,
        metadata,
        interner,
        prefabs,
        prefab_resolver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Registry;
    use crate::entity::Entity;
    use crate::storage::Row;
    use crate::types::{Interner, Type, TypeId};
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn e(id: u64) -> Entity {
        Entity::from_id(id)
    }

    #[derive(Default)]
    struct World {
        rows: RefCell<HashMap<Entity, (TypeId, Row)>>,
        components: RefCell<HashMap<Entity, Vec<Entity>>>,
        prefab_parents: HashMap<Entity, Entity>,
    }

    impl World {
        fn place(&self, entity: Entity, type_id: TypeId, row: Row) {
            self.rows.borrow_mut().insert(entity, (type_id, row));
        }
    }

    impl EntityIndex for World {
        fn get_row(&self, entity: Entity) -> Option<(TypeId, Row)> {
            self.rows.borrow().get(&entity).copied()
        }
        fn watch(&mut self, _entity: Entity) {}
        fn set_type_for_entity(&mut self, entity: Entity, type_id: TypeId, row: Row) {
            self.place(entity, type_id, row);
        }
        fn has_component(&self, entity: Entity, component: Entity) -> bool {
            self.components
                .borrow()
                .get(&entity)
                .is_some_and(|cs| cs.contains(&component))
        }
        fn prefab_parent_of(&self, entity: Entity) -> Option<Entity> {
            self.prefab_parents.get(&entity).copied()
        }
    }

    #[derive(Default)]
    struct NoPrefabs;
    impl PrefabIndex for NoPrefabs {
        fn register_prefab(&mut self, _type_id: TypeId, _prefab: Entity) {}
        fn prefab_for(&self, _type_id: TypeId) -> Option<Entity> {
            None
        }
    }
    impl PrefabResolver for NoPrefabs {
        fn find_entity_in_prefabs(
            &self,
            _starting: Entity,
            _ty: &Type,
            _component: Entity,
            _excluded: Option<Entity>,
        ) -> Option<Entity> {
            None
        }
    }

    fn setup() -> (World, Registry, Interner, NoPrefabs) {
        (World::default(), Registry::new(), Interner::new(), NoPrefabs)
    }

    #[test]
    fn basic_and_on_self_matches_only_tables_with_the_component() {
        // Given: T1={A,B}, T2={A}, T3={B,C}
        let (world, registry, interner, prefabs) = setup();
        registry.register(e(1), 4);
        registry.register(e(2), 4);
        registry.register(e(3), 4);

        let mut storage = Storage::new();
        storage.get_or_create_table(Type::new(vec![e(1), e(2)]), &interner, &registry);
        storage.get_or_create_table(Type::new(vec![e(1)]), &interner, &registry);
        storage.get_or_create_table(Type::new(vec![e(2), e(3)]), &interner, &registry);

        let mut world = world;
        let signature = Signature::compile(
            vec![SignatureColumn::new(
                SourceKind::This,
                Operator::And,
                Target::Component(e(1)),
            )],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When
        let query = Query::new(signature, None, &storage, &ctx);

        // Then
        assert_eq!(query.matched_tables().len(), 2);
    }

    #[test]
    fn optional_column_reads_as_tag_when_absent() {
        // Given: T1={A,B}, T2={A}
        let (mut world, registry, interner, prefabs) = setup();
        registry.register(e(1), 4);
        registry.register(e(2), 4);

        let mut storage = Storage::new();
        storage.get_or_create_table(Type::new(vec![e(1), e(2)]), &interner, &registry);
        storage.get_or_create_table(Type::new(vec![e(1)]), &interner, &registry);

        let signature = Signature::compile(
            vec![
                SignatureColumn::new(SourceKind::This, Operator::And, Target::Component(e(1))),
                SignatureColumn::new(SourceKind::This, Operator::Optional, Target::Component(e(2))),
            ],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When
        let query = Query::new(signature, None, &storage, &ctx);

        // Then
        assert_eq!(query.matched_tables().len(), 2);
        let with_b = query
            .matched_tables()
            .iter()
            .find(|m| matches!(m.slots[1], PlanSlot::Column(_)))
            .unwrap();
        let without_b = query
            .matched_tables()
            .iter()
            .find(|m| matches!(m.slots[1], PlanSlot::Tag))
            .unwrap();
        assert_ne!(with_b.type_id, without_b.type_id);
    }

    #[test]
    fn or_over_type_matches_either_alternative() {
        // Given: T1={A}, T2={B}, T3={C}
        let (mut world, registry, interner, prefabs) = setup();
        registry.register(e(1), 4);
        registry.register(e(2), 4);
        registry.register(e(3), 4);

        let mut storage = Storage::new();
        let (t1, _, _) = storage.get_or_create_table(Type::new(vec![e(1)]), &interner, &registry);
        let (t2, _, _) = storage.get_or_create_table(Type::new(vec![e(2)]), &interner, &registry);
        storage.get_or_create_table(Type::new(vec![e(3)]), &interner, &registry);

        let signature = Signature::compile(
            vec![SignatureColumn::new(
                SourceKind::This,
                Operator::Or,
                Target::Alternatives(Type::new(vec![e(1), e(2)])),
            )],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When
        let query = Query::new(signature, None, &storage, &ctx);

        // Then
        assert_eq!(query.matched_tables().len(), 2);
        let ids: Vec<_> = query.matched_tables().iter().map(|m| m.type_id).collect();
        assert!(ids.contains(&t1));
        assert!(ids.contains(&t2));
    }

    #[test]
    fn container_redirection_resolves_through_the_parent() {
        // Given: parent p has {X}; child c = CHILDOF(p) + {Y}
        let (mut world, registry, interner, prefabs) = setup();
        registry.register(e(10), 4); // X
        registry.register(e(20), 4); // Y

        let mut storage = Storage::new();
        let (parent_type, _, _) = storage.get_or_create_table(Type::new(vec![e(10)]), &interner, &registry);
        let parent = e(100);
        world.place(parent, parent_type, Row::new(0));

        let child_ty = Type::new(vec![Entity::childof(parent), e(20)]);
        let (child_type_id, child_table, _) = storage.get_or_create_table(child_ty, &interner, &registry);
        child_table.insert(e(200));

        let signature = Signature::compile(
            vec![
                SignatureColumn::new(SourceKind::Container, Operator::And, Target::Component(e(10))),
                SignatureColumn::new(SourceKind::This, Operator::And, Target::Component(e(20))),
            ],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When
        let query = Query::new(signature, None, &storage, &ctx);

        // Then
        assert_eq!(query.matched_tables().len(), 1);
        let record = &query.matched_tables()[0];
        assert_eq!(record.type_id, child_type_id);
        assert!(matches!(record.slots[0], PlanSlot::Reference(_)));
        assert_eq!(record.references[0].entity, parent);
        assert_eq!(record.references[0].component, e(10));
        assert!(matches!(record.slots[1], PlanSlot::Column(_)));
    }

    struct WithPrefab {
        prefab_for: HashMap<TypeId, Entity>,
    }
    impl PrefabIndex for WithPrefab {
        fn register_prefab(&mut self, _type_id: TypeId, _prefab: Entity) {}
        fn prefab_for(&self, type_id: TypeId) -> Option<Entity> {
            self.prefab_for.get(&type_id).copied()
        }
    }
    impl PrefabResolver for WithPrefab {
        fn find_entity_in_prefabs(
            &self,
            _starting: Entity,
            ty: &Type,
            _component: Entity,
            excluded: Option<Entity>,
        ) -> Option<Entity> {
            // This crate's tests only exercise one level of prefab inheritance, so a
            // linear scan over the registered (empty) instance type is enough -- real
            // resolution walks the chain via an interner the way `World` does.
            let _ = ty;
            self.prefab_for.values().copied().find(|p| Some(*p) != excluded)
        }
    }

    #[test]
    fn prefab_inheritance_resolves_a_shared_component_through_the_ancestor() {
        // Given: prefab table PF={S}; instance table T={} shares PF for component S.
        let (mut world, registry, interner, _) = setup();
        registry.register(e(1), 4); // S

        let mut storage = Storage::new();
        let (prefab_type, _, _) =
            storage.get_or_create_table(Type::new(vec![e(1)]), &interner, &registry);
        let prefab_entity = e(500);
        world.place(prefab_entity, prefab_type, Row::new(0));

        let (instance_type, _, _) =
            storage.get_or_create_table(Type::empty(), &interner, &registry);

        let mut prefab_for = HashMap::new();
        prefab_for.insert(instance_type, prefab_entity);
        let prefabs = WithPrefab { prefab_for };

        let signature = Signature::compile(
            vec![SignatureColumn::new(
                SourceKind::Shared,
                Operator::And,
                Target::Component(e(1)),
            )],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When
        let query = Query::new(signature, None, &storage, &ctx);

        // Then
        assert_eq!(query.matched_tables().len(), 1);
        let record = &query.matched_tables()[0];
        assert_eq!(record.type_id, instance_type);
        assert!(matches!(record.slots[0], PlanSlot::Reference(_)));
    }

    #[test]
    fn shared_or_resolves_the_matching_alternative_through_the_prefab_chain() {
        // Given: prefab table PF={S2}; instance table T={} shares PF. The Or column
        // offers {S1, S2} as alternatives -- only S2 is reachable, and only via the
        // prefab ancestor, not the instance's own (empty) type.
        let (mut world, registry, interner, _) = setup();
        registry.register(e(1), 4); // S1
        registry.register(e(2), 4); // S2

        let mut storage = Storage::new();
        let (prefab_type, _, _) =
            storage.get_or_create_table(Type::new(vec![e(2)]), &interner, &registry);
        let prefab_entity = e(500);
        world.place(prefab_entity, prefab_type, Row::new(0));

        let (instance_type, _, _) =
            storage.get_or_create_table(Type::empty(), &interner, &registry);

        let mut prefab_for = HashMap::new();
        prefab_for.insert(instance_type, prefab_entity);
        let prefabs = WithPrefab { prefab_for };

        let signature = Signature::compile(
            vec![SignatureColumn::new(
                SourceKind::Shared,
                Operator::Or,
                Target::Alternatives(Type::new(vec![e(1), e(2)])),
            )],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When
        let query = Query::new(signature, None, &storage, &ctx);

        // Then: gating never rejects Shared+Or (the original has the same hole), so the
        // instance table matches regardless -- what's under test is that the resolved
        // component is the prefab-held S2, not a guess and not S1.
        assert_eq!(query.matched_tables().len(), 1);
        let record = &query.matched_tables()[0];
        assert_eq!(record.type_id, instance_type);
        assert_eq!(record.components[0], e(2));
        assert!(matches!(record.slots[0], PlanSlot::Reference(_)));
        assert_eq!(record.references[0].entity, prefab_entity);
        assert_eq!(record.references[0].component, e(2));
    }

    #[test]
    fn shared_component_owned_locally_does_not_match() {
        // Given: T = {S, INSTANCEOF(pf)} -- S is both owned and (notionally) shared.
        let (mut world, registry, interner, prefabs) = setup();
        registry.register(e(1), 4); // S

        let mut storage = Storage::new();
        storage.get_or_create_table(Type::new(vec![e(1), e(2)]), &interner, &registry);

        let signature = Signature::compile(
            vec![SignatureColumn::new(
                SourceKind::Shared,
                Operator::And,
                Target::Component(e(1)),
            )],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When
        let query = Query::new(signature, None, &storage, &ctx);

        // Then
        assert!(query.matched_tables().is_empty());
    }

    #[test]
    fn new_query_and_incremental_match_table_converge_on_the_same_matched_set() {
        // Given: T1={A,B}, T2={A}, T3={B,C} -- same tables, two construction orders.
        let (mut world, registry, interner, prefabs) = setup();
        registry.register(e(1), 4); // A
        registry.register(e(2), 4); // B
        registry.register(e(3), 4); // C

        let mut storage = Storage::new();
        storage.get_or_create_table(Type::new(vec![e(1), e(2)]), &interner, &registry);
        storage.get_or_create_table(Type::new(vec![e(1)]), &interner, &registry);
        storage.get_or_create_table(Type::new(vec![e(2), e(3)]), &interner, &registry);

        let signature = Signature::compile(
            vec![SignatureColumn::new(SourceKind::This, Operator::And, Target::Component(e(1)))],
            &mut world,
        );
        let ctx = context(&world, &registry, &interner, &prefabs, &prefabs);

        // When: populated against every existing table at once...
        let up_front = Query::new(signature.clone(), None, &storage, &ctx);

        // ...versus offered the same tables one at a time after the query already exists.
        let mut incremental = Query::new(signature, None, &Storage::new(), &ctx);
        for (_, table) in storage.iter() {
            incremental.match_table(table, &ctx);
        }

        // Then
        let up_front_ids: Vec<TypeId> = up_front.matched_tables().iter().map(|m| m.type_id).collect();
        let incremental_ids: Vec<TypeId> = incremental.matched_tables().iter().map(|m| m.type_id).collect();
        assert_eq!(up_front_ids.len(), 2);
        assert_eq!(up_front_ids, incremental_ids);
    }
}
