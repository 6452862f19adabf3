//! The workflow graph: the root block owning the whole block tree, every slot and
//! every data link.
//!
//! Blocks, slots and links live in arenas keyed by their ids. Ids are never reused, so
//! a stale id simply stops resolving once its element is removed.

use crate::block::{Block, BlockId, BlockKind, ModelBlock};
use crate::error::GraphError;
use crate::link::{DataLink, LinkId, plan_connection};
use crate::model::ModelRegistry;
use crate::slot::{DataSlot, SlotDirection, SlotId, SlotKind, SlotSpec};
use ahash::AHashMap;
use itertools::Itertools;

mod consistency;
mod naming;

pub use consistency::ConsistencyIssue;
pub use naming::sanitize_identifier;

/// The root of a workflow and the owner of all its elements.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    root: BlockId,
    blocks: AHashMap<BlockId, Block>,
    slots: AHashMap<SlotId, DataSlot>,
    links: AHashMap<LinkId, DataLink>,
    next_id: usize,
    registry: ModelRegistry,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new("MyWorkflow")
    }
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(name, ModelRegistry::new())
    }

    pub fn with_registry(name: impl Into<String>, registry: ModelRegistry) -> Self {
        Self::with_root_uid(name, registry, None)
    }

    pub(crate) fn with_root_uid(
        name: impl Into<String>,
        registry: ModelRegistry,
        uid: Option<String>,
    ) -> Self {
        let root = BlockId(0);
        let mut root_block = Block::new(BlockKind::Workflow, None, uid);
        let name = name.into();
        root_block.name = name.clone();

        let mut blocks = AHashMap::new();
        blocks.insert(root, root_block);
        Self {
            name,
            root,
            blocks,
            slots: AHashMap::new(),
            links: AHashMap::new(),
            next_id: 1,
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if let Some(root) = self.blocks.get_mut(&self.root) {
            root.name = self.name.clone();
        }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    // --- Lookups ---

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    pub fn slot(&self, id: SlotId) -> Option<&DataSlot> {
        self.slots.get(&id)
    }

    pub(crate) fn slot_mut(&mut self, id: SlotId) -> Option<&mut DataSlot> {
        self.slots.get_mut(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&DataLink> {
        self.links.get(&id)
    }

    pub fn block_by_uid(&self, uid: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .find(|(_, b)| b.uid == uid)
            .map(|(id, _)| *id)
    }

    pub fn slot_by_uid(&self, uid: &str) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|(_, s)| s.uid == uid)
            .map(|(id, _)| *id)
    }

    pub fn slot_by_name(&self, block: BlockId, name: &str) -> Option<SlotId> {
        self.blocks.get(&block)?.slots.iter().copied().find(|id| {
            self.slots
                .get(id)
                .is_some_and(|slot| slot.name == name)
        })
    }

    /// Child blocks in execution order.
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.blocks
            .get(&block)
            .map(|b| b.children.as_slice())
            .unwrap_or_default()
    }

    pub fn slots_of(&self, block: BlockId) -> &[SlotId] {
        self.blocks
            .get(&block)
            .map(|b| b.slots.as_slice())
            .unwrap_or_default()
    }

    /// All blocks below `block` in pre-order, excluding `block` itself.
    pub fn descendants(&self, block: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        self.collect_descendants(block, &mut out);
        out
    }

    fn collect_descendants(&self, block: BlockId, out: &mut Vec<BlockId>) {
        for child in self.children(block) {
            out.push(*child);
            self.collect_descendants(*child, out);
        }
    }

    /// The root followed by every other block in tree order.
    pub fn blocks_in_tree_order(&self) -> Vec<BlockId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .collect()
    }

    /// Every slot of every block, in tree order.
    pub fn slots_in_tree_order(&self) -> Vec<SlotId> {
        self.blocks_in_tree_order()
            .into_iter()
            .flat_map(|b| self.slots_of(b).to_vec())
            .collect()
    }

    /// Model blocks anywhere inside `block`, in tree order.
    pub fn models_within(&self, block: BlockId) -> Vec<BlockId> {
        self.descendants(block)
            .into_iter()
            .filter(|id| self.is_model(*id))
            .collect()
    }

    pub(crate) fn is_model(&self, block: BlockId) -> bool {
        self.blocks
            .get(&block)
            .is_some_and(|b| matches!(b.kind, BlockKind::Model(_)))
    }

    /// Links ordered by creation.
    pub fn links(&self) -> Vec<LinkId> {
        self.links.keys().copied().sorted().collect()
    }

    /// Boundary slots of the workflow with the given inner direction.
    pub fn external_slots(&self, direction: SlotDirection) -> Vec<SlotId> {
        self.slots_in_tree_order()
            .into_iter()
            .filter(|id| {
                self.slots
                    .get(id)
                    .is_some_and(|s| s.is_external() && s.direction() == direction)
            })
            .collect()
    }

    /// The slot at the other end of the first link of `slot`.
    pub fn linked_slot(&self, slot: SlotId) -> Option<SlotId> {
        let link = *self.slots.get(&slot)?.links.first()?;
        self.other_endpoint(link, slot)
    }

    /// Every slot connected to `slot`.
    pub fn linked_slots(&self, slot: SlotId) -> Vec<SlotId> {
        self.slots
            .get(&slot)
            .map(|s| {
                s.links
                    .iter()
                    .filter_map(|l| self.other_endpoint(*l, slot))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn other_endpoint(&self, link: LinkId, known: SlotId) -> Option<SlotId> {
        self.links.get(&link)?.other_endpoint(known)
    }

    // --- Construction ---

    fn allocate(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Appends a new block of `kind` to `parent`, creating the kind's default slots.
    pub fn add_block(&mut self, parent: BlockId, kind: BlockKind) -> Result<BlockId, GraphError> {
        self.insert_block(parent, kind, None)
    }

    /// Appends a block wrapping a registered model class, with one slot per declared
    /// input and output.
    pub fn add_model_block(
        &mut self,
        parent: BlockId,
        class_name: &str,
    ) -> Result<BlockId, GraphError> {
        self.insert_model_block(parent, ModelBlock::new(class_name), None)
    }

    pub(crate) fn insert_model_block(
        &mut self,
        parent: BlockId,
        model: ModelBlock,
        uid: Option<String>,
    ) -> Result<BlockId, GraphError> {
        let class = self
            .registry
            .get(&model.class_name)
            .ok_or_else(|| GraphError::UnknownModel(model.class_name.clone()))?;
        if let Some(name) = class.metadata.duplicate_slot_name() {
            return Err(GraphError::DuplicateSlotName {
                block: model.class_name.clone(),
                name: name.to_string(),
            });
        }
        let specs = class.metadata.slot_specs();
        let class_name = model.class_name.clone();

        let id = self.insert_block(parent, BlockKind::Model(model), uid)?;
        if let Some(block) = self.blocks.get_mut(&id) {
            block.name = class_name;
        }
        for spec in specs {
            self.add_slot(id, spec)?;
        }
        Ok(id)
    }

    pub(crate) fn insert_block(
        &mut self,
        parent: BlockId,
        kind: BlockKind,
        uid: Option<String>,
    ) -> Result<BlockId, GraphError> {
        let parent_block = self
            .blocks
            .get(&parent)
            .ok_or_else(|| GraphError::BlockNotFound(format!("{:?}", parent)))?;
        if !parent_block.kind.is_container() {
            return Err(GraphError::NotAContainer {
                parent: parent_block.name.clone(),
            });
        }

        let default_slots = kind.default_slots();
        let id = BlockId(self.allocate());
        self.blocks.insert(id, Block::new(kind, Some(parent), uid));
        if let Some(parent_block) = self.blocks.get_mut(&parent) {
            parent_block.children.push(id);
        }
        for spec in default_slots {
            self.add_slot(id, spec)?;
        }
        Ok(id)
    }

    /// Adds a slot to `block`. Slot names must be unique per block, and external slots
    /// belong to the workflow root only.
    pub fn add_slot(&mut self, block: BlockId, spec: SlotSpec) -> Result<SlotId, GraphError> {
        let owner = self
            .blocks
            .get(&block)
            .ok_or_else(|| GraphError::BlockNotFound(format!("{:?}", block)))?;
        if spec.kind.is_external() && block != self.root {
            return Err(GraphError::ExternalSlotOutsideWorkflow {
                block: owner.name.clone(),
                slot: spec.name,
            });
        }
        if self.slot_by_name(block, &spec.name).is_some() {
            return Err(GraphError::DuplicateSlotName {
                block: owner.name.clone(),
                name: spec.name,
            });
        }

        let id = SlotId(self.allocate());
        self.slots.insert(id, DataSlot::from_spec(block, spec));
        if let Some(owner) = self.blocks.get_mut(&block) {
            owner.slots.push(id);
        }
        Ok(id)
    }

    /// Renames a slot. External slots keep their object id in sync with the name.
    pub fn rename_slot(&mut self, slot: SlotId, name: &str) -> Result<(), GraphError> {
        let owner = self
            .slots
            .get(&slot)
            .ok_or_else(|| GraphError::SlotNotFound(format!("{:?}", slot)))?
            .owner;
        if let Some(existing) = self.slot_by_name(owner, name) {
            if existing != slot {
                return Err(GraphError::DuplicateSlotName {
                    block: self.blocks[&owner].name.clone(),
                    name: name.to_string(),
                });
            }
        }
        if let Some(s) = self.slots.get_mut(&slot) {
            s.name = name.to_string();
            if s.is_external() {
                s.obj_id = crate::slot::ObjectId::Name(name.to_string());
            }
        }
        Ok(())
    }

    /// Removes a slot and every link attached to it.
    pub fn remove_slot(&mut self, slot: SlotId) -> Result<(), GraphError> {
        let removed = self
            .slots
            .get(&slot)
            .ok_or_else(|| GraphError::SlotNotFound(format!("{:?}", slot)))?;
        let owner = removed.owner;
        for link in removed.links.clone() {
            self.disconnect(link);
        }
        self.slots.remove(&slot);
        if let Some(block) = self.blocks.get_mut(&owner) {
            block.slots.retain(|s| *s != slot);
        }
        Ok(())
    }

    /// Removes a block with its whole subtree, releasing owned slots and their links.
    pub fn remove_block(&mut self, block: BlockId) -> Result<(), GraphError> {
        if block == self.root {
            return Err(GraphError::RootBlock("removed"));
        }
        let parent = self
            .blocks
            .get(&block)
            .ok_or_else(|| GraphError::BlockNotFound(format!("{:?}", block)))?
            .parent;

        let subtree: Vec<BlockId> = std::iter::once(block)
            .chain(self.descendants(block))
            .collect();
        for id in &subtree {
            for slot in self.slots_of(*id).to_vec() {
                self.remove_slot(slot)?;
            }
        }
        for id in &subtree {
            self.blocks.remove(id);
        }
        if let Some(parent) = parent.and_then(|p| self.blocks.get_mut(&p)) {
            parent.children.retain(|c| *c != block);
        }
        Ok(())
    }

    /// Re-parents `block` under `new_parent` at `index` (clamped to the child count).
    pub fn move_block(
        &mut self,
        block: BlockId,
        new_parent: BlockId,
        index: usize,
    ) -> Result<(), GraphError> {
        if block == self.root {
            return Err(GraphError::RootBlock("moved"));
        }
        let moved = self
            .blocks
            .get(&block)
            .ok_or_else(|| GraphError::BlockNotFound(format!("{:?}", block)))?;
        let old_parent = moved.parent;
        let moved_name = moved.name.clone();
        let target = self
            .blocks
            .get(&new_parent)
            .ok_or_else(|| GraphError::BlockNotFound(format!("{:?}", new_parent)))?;
        if !target.kind.is_container() {
            return Err(GraphError::NotAContainer {
                parent: target.name.clone(),
            });
        }
        if new_parent == block || self.descendants(block).contains(&new_parent) {
            return Err(GraphError::CyclicMove { block: moved_name });
        }

        if let Some(parent) = old_parent.and_then(|p| self.blocks.get_mut(&p)) {
            parent.children.retain(|c| *c != block);
        }
        if let Some(parent) = self.blocks.get_mut(&new_parent) {
            let index = index.min(parent.children.len());
            parent.children.insert(index, block);
        }
        if let Some(moved) = self.blocks.get_mut(&block) {
            moved.parent = Some(new_parent);
        }
        Ok(())
    }

    // --- Links ---

    /// Connects two slots, in either argument order.
    ///
    /// The request is fully validated before either slot is modified; a rejected
    /// request is logged and leaves the graph untouched.
    pub fn connect(&mut self, a: SlotId, b: SlotId) -> Result<LinkId, GraphError> {
        self.connect_with_uid(a, b, None)
    }

    pub(crate) fn connect_with_uid(
        &mut self,
        a: SlotId,
        b: SlotId,
        uid: Option<String>,
    ) -> Result<LinkId, GraphError> {
        let result = self.plan(a, b);
        let plan = match result {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("rejected connection: {}", e);
                return Err(e);
            }
        };

        if let Some((slot, slot_type)) = plan.adopt_type {
            if let Some(slot) = self.slots.get_mut(&slot) {
                slot.slot_type = slot_type;
            }
        }
        let id = LinkId(self.allocate());
        self.links.insert(
            id,
            DataLink {
                uid: uid.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                source: plan.source,
                target: plan.target,
            },
        );
        for endpoint in [plan.source, plan.target] {
            if let Some(slot) = self.slots.get_mut(&endpoint) {
                slot.links.push(id);
            }
        }
        Ok(id)
    }

    fn plan(&self, a: SlotId, b: SlotId) -> Result<crate::link::ConnectionPlan, GraphError> {
        let slot_a = self
            .slots
            .get(&a)
            .ok_or_else(|| GraphError::SlotNotFound(format!("{:?}", a)))?;
        let slot_b = self
            .slots
            .get(&b)
            .ok_or_else(|| GraphError::SlotNotFound(format!("{:?}", b)))?;
        let already_linked = slot_a
            .links
            .iter()
            .filter_map(|l| self.links.get(l))
            .any(|l| l.connects(a, b));
        plan_connection((a, slot_a), (b, slot_b), already_linked)
    }

    /// Removes a link from both endpoints. Returns `false` if it was already gone.
    pub fn disconnect(&mut self, link: LinkId) -> bool {
        let Some(removed) = self.links.remove(&link) else {
            return false;
        };
        for endpoint in [removed.source, removed.target] {
            if let Some(slot) = self.slots.get_mut(&endpoint) {
                slot.links.retain(|l| *l != link);
            }
        }
        true
    }

    /// Removes the link between two slots, if there is one.
    pub fn disconnect_slots(&mut self, a: SlotId, b: SlotId) -> bool {
        let link = self.slots.get(&a).and_then(|slot| {
            slot.links
                .iter()
                .copied()
                .find(|l| self.links.get(l).is_some_and(|l| l.connects(a, b)))
        });
        match link {
            Some(link) => self.disconnect(link),
            None => false,
        }
    }

    /// The kind of the slot, for callers that only hold an id.
    pub fn slot_kind(&self, slot: SlotId) -> Option<SlotKind> {
        self.slots.get(&slot).map(|s| s.kind)
    }
}
