//! Table matching and plan compilation.

use crate::component::ComponentMetadata;
use crate::entity::{Entity, EntityIndex};
use crate::prefab::{DISABLED, PREFAB, PrefabIndex, PrefabResolver};
use crate::query::matched::{MatchedTable, PlanSlot, Reference};
use crate::query::signature::{Operator, Signature, SourceKind, Target};
use crate::storage::Table;
use crate::types::{Type, TypeId, TypeInterner};

/// The collaborators matching needs, bundled so `match_table`/`compile_plan` don't carry
/// five separate parameters.
pub struct MatchContext<'a> {
    pub entities: &'a dyn EntityIndex,
    pub metadata: &'a dyn ComponentMetadata,
    pub interner: &'a dyn TypeInterner,
    pub prefabs: &'a dyn PrefabIndex,
    pub prefab_resolver: &'a dyn PrefabResolver,
}

fn childof_parents(ty: &Type) -> impl Iterator<Item = Entity> + '_ {
    ty.as_slice().iter().filter(|e| e.is_childof()).filter_map(|e| e.parent())
}

fn type_of(ctx: &MatchContext, entity: Entity) -> Option<(TypeId, Type)> {
    let (type_id, _row) = ctx.entities.get_row(entity)?;
    let ty = ctx.interner.type_of(type_id)?;
    Some((type_id, ty))
}

/// Whether `component` is a member of `ty`, optionally also searching the prefab ancestor
/// chain registered for `type_id`.
fn reachable(ctx: &MatchContext, ty: &Type, type_id: TypeId, component: Entity, search_prefabs: bool) -> bool {
    if ty.contains(component) {
        return true;
    }
    if !search_prefabs {
        return false;
    }
    let Some(prefab) = ctx.prefabs.prefab_for(type_id) else {
        return false;
    };
    let Some((prefab_type_id, prefab_ty)) = type_of(ctx, prefab) else {
        return false;
    };
    reachable(ctx, &prefab_ty, prefab_type_id, component, true)
}

/// Whether a table's type satisfies a queried set of components.
fn contains(ctx: &MatchContext, ty: &Type, type_id: TypeId, what: &Type, match_all: bool, search_prefabs: bool) -> bool {
    if what.is_empty() {
        return !match_all;
    }
    if match_all {
        what.as_slice().iter().all(|&c| reachable(ctx, ty, type_id, c, search_prefabs))
    } else {
        what.as_slice().iter().any(|&c| reachable(ctx, ty, type_id, c, search_prefabs))
    }
}

fn parent_table_contains(ctx: &MatchContext, parent: Entity, component: Entity) -> bool {
    let Some((type_id, ty)) = type_of(ctx, parent) else {
        return false;
    };
    reachable(ctx, &ty, type_id, component, true)
}

fn has_matching_parent(ctx: &MatchContext, ty: &Type, component: Entity) -> bool {
    childof_parents(ty).any(|parent| parent_table_contains(ctx, parent, component))
}

fn first_matching_parent(ctx: &MatchContext, ty: &Type, component: Entity) -> Option<Entity> {
    childof_parents(ty).find(|&parent| parent_table_contains(ctx, parent, component))
}

fn has_any_matching_parent_for_alternatives(ctx: &MatchContext, ty: &Type, alts: &Type) -> bool {
    childof_parents(ty).any(|parent| {
        type_of(ctx, parent)
            .map(|(_, parent_ty)| parent_ty.first_of(alts).is_some())
            .unwrap_or(false)
    })
}

fn first_alternative_via_container(ctx: &MatchContext, ty: &Type, alts: &Type) -> Option<Entity> {
    childof_parents(ty).find_map(|parent| type_of(ctx, parent).and_then(|(_, parent_ty)| parent_ty.first_of(alts)))
}

/// The first of `alts` reachable from `ty`, searching the prefab ancestor chain registered
/// for `type_id` when `ty` itself doesn't carry any alternative. Mirrors [`reachable`]'s
/// walk, but returns which alternative matched rather than a yes/no for one component.
fn first_alternative_via_prefab(ctx: &MatchContext, ty: &Type, type_id: TypeId, alts: &Type) -> Option<Entity> {
    if let Some(found) = ty.first_of(alts) {
        return Some(found);
    }
    let prefab = ctx.prefabs.prefab_for(type_id)?;
    let (prefab_type_id, prefab_ty) = type_of(ctx, prefab)?;
    first_alternative_via_prefab(ctx, &prefab_ty, prefab_type_id, alts)
}

/// Gate a table against a signature. All checks are conjunctive; the first
/// failure short-circuits.
pub fn match_table(signature: &Signature, table: &Table, ctx: &MatchContext) -> bool {
    let ty = table.ty();
    let type_id = table.type_id();

    // 1. Disabled/prefab gating.
    if !signature.include_disabled && ty.contains(DISABLED) {
        return false;
    }
    if !signature.include_prefabs && ty.contains(PREFAB) {
        return false;
    }

    // 2. AND aggregates.
    if !signature.and_from_self.is_empty()
        && !contains(ctx, ty, type_id, &signature.and_from_self, true, true)
    {
        return false;
    }
    if !signature.and_from_owned.is_empty()
        && !contains(ctx, ty, type_id, &signature.and_from_owned, true, false)
    {
        return false;
    }
    if !signature.and_from_shared.is_empty() {
        let owned_here = contains(ctx, ty, type_id, &signature.and_from_shared, true, false);
        if owned_here {
            // An owned column overrides the shared source entirely.
            return false;
        }
        if !contains(ctx, ty, type_id, &signature.and_from_shared, true, true) {
            return false;
        }
    }

    // 3. Per-column verification.
    for column in signature.columns() {
        match (column.source, column.operator, &column.target) {
            (SourceKind::This | SourceKind::Owned | SourceKind::Shared, Operator::And, _) => {}
            (SourceKind::Container, Operator::And, Target::Component(component)) => {
                if !has_matching_parent(ctx, ty, *component) {
                    return false;
                }
            }
            (SourceKind::Entity(e), Operator::And, Target::Component(component)) => {
                if !ctx.entities.has_component(e, *component) {
                    return false;
                }
            }
            (SourceKind::This, Operator::Or, Target::Alternatives(alts)) => {
                if ty.first_of(alts).is_none() {
                    return false;
                }
            }
            (SourceKind::Container, Operator::Or, Target::Alternatives(alts)) => {
                if !has_any_matching_parent_for_alternatives(ctx, ty, alts) {
                    return false;
                }
            }
            (SourceKind::Entity(e), Operator::Not, Target::Component(component)) => {
                if ctx.entities.has_component(e, *component) {
                    return false;
                }
            }
            _ => {}
        }
    }

    // 4. NOT aggregates.
    if !signature.not_from_self.is_empty()
        && contains(ctx, ty, type_id, &signature.not_from_self, false, true)
    {
        return false;
    }
    if !signature.not_from_owned.is_empty()
        && contains(ctx, ty, type_id, &signature.not_from_owned, false, false)
    {
        return false;
    }
    if !signature.not_from_shared.is_empty() {
        let owned_here = contains(ctx, ty, type_id, &signature.not_from_shared, false, false);
        let reachable_anywhere = contains(ctx, ty, type_id, &signature.not_from_shared, false, true);
        if !owned_here && reachable_anywhere {
            return false;
        }
    }

    // 5. not_from_component: Not on Container/Cascade/System sources.
    if !signature.not_from_component.is_empty()
        && signature
            .not_from_component
            .as_slice()
            .iter()
            .any(|&c| has_matching_parent(ctx, ty, c))
    {
        return false;
    }

    true
}

/// Resolve `(entity, component)` for one signature column against a table that has already
/// passed [`match_table`]. `entity == None` means "entity
/// 0": the component, if present, lives directly in the table's own columns.
fn resolve_entity_component(
    column: &crate::query::signature::SignatureColumn,
    ty: &Type,
    type_id: TypeId,
    ctx: &MatchContext,
    system: Option<Entity>,
) -> (Option<Entity>, Entity) {
    match (&column.source, &column.operator, &column.target) {
        (SourceKind::This | SourceKind::Owned | SourceKind::Shared, Operator::Or, Target::Alternatives(alts)) => {
            // Resolved through the prefab chain, not the container chain -- `Container`+`Or`
            // is the separate branch below. Gating only verifies this for `This`; if neither
            // the table's own type nor a prefab ancestor carries an alternative, there is
            // nothing to report.
            let resolved = first_alternative_via_prefab(ctx, ty, type_id, alts).unwrap_or(Entity::from_id(0));
            (None, resolved)
        }
        (SourceKind::Container, Operator::Or, Target::Alternatives(alts)) => {
            let resolved = first_alternative_via_container(ctx, ty, alts)
                .unwrap_or_else(|| alts.as_slice().first().copied().unwrap_or(Entity::from_id(0)));
            (None, resolved)
        }
        (SourceKind::This | SourceKind::Owned | SourceKind::Shared, _, Target::Component(c)) => (None, *c),
        (SourceKind::Entity(e), _, Target::Component(c)) => (Some(*e), *c),
        (SourceKind::Empty, _, Target::Component(c)) => (None, *c),
        (SourceKind::Container | SourceKind::Cascade, _, Target::Component(c)) => {
            (first_matching_parent(ctx, ty, *c), *c)
        }
        (SourceKind::System, Operator::And, Target::Component(c)) => (system, *c),
        _ => (None, Entity::from_id(0)),
    }
}

/// Compile the access plan for a table already known to match. Returns the record
/// plus the set of holder entities that must be registered with the watch set (the caller
/// holds the `&mut dyn EntityIndex` needed to actually call `watch`).
pub fn compile_plan(
    signature: &Signature,
    table: &Table,
    ctx: &MatchContext,
    system: Option<Entity>,
) -> (MatchedTable, Vec<Entity>) {
    let ty = table.ty();
    let mut slots = Vec::with_capacity(signature.columns().len());
    let mut components = Vec::with_capacity(signature.columns().len());
    let mut references = Vec::new();
    let mut to_watch = Vec::new();

    for column in signature.columns() {
        let (entity, component) = resolve_entity_component(column, ty, table.type_id(), ctx, system);
        components.push(component);

        if matches!(column.operator, Operator::Optional)
            && !reachable(ctx, ty, table.type_id(), component, true)
            && entity.is_none()
        {
            slots.push(PlanSlot::Tag);
            continue;
        }

        if matches!(column.source, SourceKind::Empty) {
            slots.push(PlanSlot::Tag);
            continue;
        }

        let local_slot = entity.is_none().then(|| ty.index_of(component)).flatten();
        let needs_reference =
            entity.is_some() || local_slot.is_none() || matches!(column.source, SourceKind::Cascade);

        if needs_reference {
            let holder = entity.or_else(|| {
                ctx.prefab_resolver
                    .find_entity_in_prefabs(Entity::from_id(0), ty, component, None)
            });
            if let Some(h) = holder {
                to_watch.push(h);
            }
            references.push(Reference {
                entity: holder.unwrap_or(Entity::from_id(0)),
                component,
                cached_ptr: None,
            });
            slots.push(PlanSlot::Reference(references.len()));
        } else {
            let idx = local_slot.expect("checked above");
            let slot = if ctx.metadata.component_size(component).unwrap_or(0) == 0 {
                PlanSlot::Tag
            } else {
                PlanSlot::Column(idx + 1)
            };
            slots.push(slot);
        }
    }

    (
        MatchedTable {
            type_id: table.type_id(),
            slots,
            components,
            references,
        },
        to_watch,
    )
}
