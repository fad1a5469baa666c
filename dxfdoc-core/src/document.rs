//! 文档模型：布局表、块表、句柄分配器与已添加对象表。
//!
//! 图元存放在文档内部的数组中，以 `EntityId` 索引；句柄只在图元附着到某个块时分配。
//! 所属块与反应器都以标识符表示，不持有引用。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{AttributeDefinition, Entity, EntityObject, EntityVariant};

/// 模型空间布局名称，也是新文档的默认布局。
pub const MODEL_SPACE_LAYOUT: &str = "Model";
pub const MODEL_SPACE_BLOCK: &str = "*Model_Space";
pub const PAPER_SPACE_BLOCK: &str = "*Paper_Space";
const DEFAULT_PAPER_LAYOUT: &str = "Layout1";

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

/// 进程内唯一的文档标识，用于拒绝来自其它文档的 `EntityId` / `BlockId`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed))
    }
}

/// 对象句柄，在文档内唯一，按 DXF 习惯以十六进制大写显示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// 图元在文档数组中的位置，与是否附着无关。只能由创建它的文档解析。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    document: DocumentId,
    index: usize,
}

impl EntityId {
    #[inline]
    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    document: DocumentId,
    index: usize,
}

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// 句柄在已添加对象表中指向的对象。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef {
    Layout(String),
    Block(BlockId),
    Entity(EntityId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("table entry name must not be empty")]
    EmptyName,
    #[error("a table entry named {0:?} already exists")]
    DuplicateName(String),
    #[error("block {0} not found")]
    BlockNotFound(BlockId),
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("entity {0} already belongs to a document, clone it instead")]
    AlreadyOwned(EntityId),
}

/// 布局只记录与之关联的块，图元存放在块中。
#[derive(Debug, Clone)]
pub struct Layout {
    name: String,
    handle: Handle,
    block: BlockId,
    tab_order: usize,
}

impl Layout {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    #[inline]
    pub fn tab_order(&self) -> usize {
        self.tab_order
    }

    #[inline]
    pub fn is_model_space(&self) -> bool {
        self.tab_order == 0
    }
}

/// 块：有序图元序列加属性定义表。关联布局的块可通过布局门面移除图元，
/// 块定义（`layout` 为空）不在此列。
#[derive(Debug, Clone)]
pub struct Block {
    name: String,
    handle: Handle,
    layout: Option<String>,
    entities: Vec<EntityId>,
    attribute_definitions: IndexMap<String, AttributeDefinition>,
}

impl Block {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// 关联布局名称，块定义返回 `None`。
    #[inline]
    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    /// 按插入顺序返回图元。
    #[inline]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn attribute_definitions(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attribute_definitions.values()
    }

    pub fn attribute_definition(&self, tag: &str) -> Option<&AttributeDefinition> {
        self.attribute_definitions.get(tag)
    }
}

#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    layouts: Vec<Layout>,
    layout_keys: HashMap<String, usize>,
    blocks: Vec<Block>,
    block_keys: HashMap<String, BlockId>,
    entities: Vec<EntityObject>,
    added_objects: HashMap<Handle, ObjectRef>,
    next_handle: u64,
}

impl Document {
    /// 新文档包含模型空间 `Model` 与图纸空间 `Layout1` 两个布局。
    pub fn new() -> Self {
        let mut doc = Self {
            id: DocumentId::next(),
            layouts: Vec::new(),
            layout_keys: HashMap::new(),
            blocks: Vec::new(),
            block_keys: HashMap::new(),
            entities: Vec::new(),
            added_objects: HashMap::new(),
            next_handle: 1,
        };
        doc.insert_layout(MODEL_SPACE_LAYOUT, MODEL_SPACE_BLOCK);
        doc.insert_layout(DEFAULT_PAPER_LAYOUT, PAPER_SPACE_BLOCK);
        doc
    }

    #[inline]
    pub fn default_layout(&self) -> &str {
        MODEL_SPACE_LAYOUT
    }

    /// 按名称（不区分大小写）查找布局。
    pub fn layout(&self, name: &str) -> Option<&Layout> {
        self.layout_keys
            .get(&table_key(name))
            .and_then(|index| self.layouts.get(*index))
    }

    #[inline]
    pub fn contains_layout(&self, name: &str) -> bool {
        self.layout_keys.contains_key(&table_key(name))
    }

    /// 按标签顺序返回全部布局。
    #[inline]
    pub fn layouts(&self) -> impl Iterator<Item = &Layout> {
        self.layouts.iter()
    }

    /// 新建图纸空间布局，并为其创建 `*Paper_Space{n}` 块。
    pub fn add_layout(&mut self, name: impl AsRef<str>) -> Result<&Layout, DocumentError> {
        let name = name.as_ref();
        if name.trim().is_empty() {
            return Err(DocumentError::EmptyName);
        }
        if self.contains_layout(name) {
            return Err(DocumentError::DuplicateName(name.to_string()));
        }
        let mut counter = 0usize;
        let block_name = loop {
            let candidate = format!("{PAPER_SPACE_BLOCK}{counter}");
            if !self.block_keys.contains_key(&table_key(&candidate)) {
                break candidate;
            }
            counter += 1;
        };
        let index = self.insert_layout(name, &block_name);
        Ok(&self.layouts[index])
    }

    /// 新建块定义。块定义不关联布局。
    pub fn add_block(&mut self, name: impl AsRef<str>) -> Result<BlockId, DocumentError> {
        let name = name.as_ref();
        if name.trim().is_empty() {
            return Err(DocumentError::EmptyName);
        }
        if self.block_keys.contains_key(&table_key(name)) {
            return Err(DocumentError::DuplicateName(name.to_string()));
        }
        Ok(self.insert_block(name, None))
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.block_slot(id).and_then(|index| self.blocks.get(index))
    }

    pub fn block_id(&self, name: &str) -> Option<BlockId> {
        self.block_keys.get(&table_key(name)).copied()
    }

    #[inline]
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (self.block_id_at(index), block))
    }

    /// 返回布局关联的块。
    pub fn layout_block(&self, name: &str) -> Option<&Block> {
        self.layout(name).and_then(|layout| self.block(layout.block))
    }

    /// 登记一个未附着的图元。图元在附着前没有句柄，也不属于任何块。
    pub fn create_entity(&mut self, object: EntityObject) -> EntityId {
        let id = self.entity_id_at(self.entities.len());
        self.entities.push(object);
        id
    }

    /// 按标识查找图元，来自其它文档的标识返回 `None`。
    #[inline]
    pub fn entity(&self, id: EntityId) -> Option<&EntityObject> {
        self.entity_slot(id).and_then(|index| self.entities.get(index))
    }

    /// 可变访问图元的数据载荷。所属块与句柄只能经由块追加/移除修改。
    pub fn entity_data_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entity_object_mut(id).map(EntityObject::data_mut)
    }

    /// 按具体类型可变访问载荷，类型不符时返回 `None`。
    pub fn payload_mut<T: EntityVariant>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entity_object_mut(id)
            .and_then(|object| object.get_mut::<T>())
    }

    pub fn set_entity_layer(
        &mut self,
        id: EntityId,
        layer: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let object = self
            .entity_object_mut(id)
            .ok_or(DocumentError::EntityNotFound(id))?;
        object.set_layer(layer);
        Ok(())
    }

    #[inline]
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &EntityObject)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(index, object)| (self.entity_id_at(index), object))
    }

    /// 复制一个图元为新的未附着图元，用于在其它位置复用。
    pub fn clone_entity(&mut self, id: EntityId) -> Option<EntityId> {
        let copy = self.entity(id)?.detached_copy();
        Some(self.create_entity(copy))
    }

    /// 记录 `reactor` 依赖于该图元。已存在时返回 `false`。
    pub fn add_reactor(&mut self, id: EntityId, reactor: Handle) -> Result<bool, DocumentError> {
        let object = self
            .entity_object_mut(id)
            .ok_or(DocumentError::EntityNotFound(id))?;
        Ok(object.add_reactor(reactor))
    }

    pub fn remove_reactor(&mut self, id: EntityId, reactor: Handle) -> bool {
        self.entity_object_mut(id)
            .is_some_and(|object| object.remove_reactor(reactor))
    }

    #[inline]
    pub fn contains_handle(&self, handle: Handle) -> bool {
        self.added_objects.contains_key(&handle)
    }

    #[inline]
    pub fn object_by_handle(&self, handle: Handle) -> Option<&ObjectRef> {
        self.added_objects.get(&handle)
    }

    #[inline]
    pub fn added_object_count(&self) -> usize {
        self.added_objects.len()
    }

    /// 块追加路径：分配句柄、写入所属块、追加到块序列末尾并登记句柄。
    ///
    /// 前置检查全部通过后才修改状态，失败时文档保持不变。
    pub fn append_to_block(
        &mut self,
        block: BlockId,
        id: EntityId,
    ) -> Result<Handle, DocumentError> {
        if self.block(block).is_none() {
            return Err(DocumentError::BlockNotFound(block));
        }
        match self.entity(id) {
            None => return Err(DocumentError::EntityNotFound(id)),
            Some(object) if object.is_attached() => return Err(DocumentError::AlreadyOwned(id)),
            Some(_) => {}
        }

        let handle = self.allocate_handle();
        if let Some(object) = self.entities.get_mut(id.index) {
            object.attach(block, handle);
        }
        if let Some(target) = self.blocks.get_mut(block.index) {
            target.entities.push(id);
        }
        self.added_objects.insert(handle, ObjectRef::Entity(id));
        Ok(handle)
    }

    /// 块移除路径：从块序列中移除图元，清空所属块与句柄并注销句柄。
    /// 图元不在该块中时返回 `false`。
    pub fn remove_from_block(&mut self, block: BlockId, id: EntityId) -> bool {
        let Some(target) = self.block_slot(block).and_then(|index| self.blocks.get_mut(index))
        else {
            return false;
        };
        let Some(position) = target.entities.iter().position(|entry| *entry == id) else {
            return false;
        };
        target.entities.remove(position);

        if let Some(object) = self.entities.get_mut(id.index) {
            if let Some(handle) = object.handle() {
                self.added_objects.remove(&handle);
            }
            object.detach();
        }
        true
    }

    /// 以标签为键插入属性定义，返回被替换的旧定义。
    pub fn add_attribute_definition(
        &mut self,
        block: BlockId,
        definition: AttributeDefinition,
    ) -> Result<Option<AttributeDefinition>, DocumentError> {
        let target = self
            .block_slot(block)
            .and_then(|index| self.blocks.get_mut(index))
            .ok_or(DocumentError::BlockNotFound(block))?;
        Ok(target
            .attribute_definitions
            .insert(definition.tag.clone(), definition))
    }

    fn entity_slot(&self, id: EntityId) -> Option<usize> {
        (id.document == self.id).then_some(id.index)
    }

    fn block_slot(&self, id: BlockId) -> Option<usize> {
        (id.document == self.id).then_some(id.index)
    }

    fn entity_id_at(&self, index: usize) -> EntityId {
        EntityId {
            document: self.id,
            index,
        }
    }

    fn block_id_at(&self, index: usize) -> BlockId {
        BlockId {
            document: self.id,
            index,
        }
    }

    fn entity_object_mut(&mut self, id: EntityId) -> Option<&mut EntityObject> {
        let index = self.entity_slot(id)?;
        self.entities.get_mut(index)
    }

    fn allocate_handle(&mut self) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn insert_block(&mut self, name: &str, layout: Option<&str>) -> BlockId {
        let id = self.block_id_at(self.blocks.len());
        let handle = self.allocate_handle();
        self.blocks.push(Block {
            name: name.to_string(),
            handle,
            layout: layout.map(str::to_string),
            entities: Vec::new(),
            attribute_definitions: IndexMap::new(),
        });
        self.block_keys.insert(table_key(name), id);
        self.added_objects.insert(handle, ObjectRef::Block(id));
        id
    }

    fn insert_layout(&mut self, name: &str, block_name: &str) -> usize {
        let block = self.insert_block(block_name, Some(name));
        let index = self.layouts.len();
        let handle = self.allocate_handle();
        self.layouts.push(Layout {
            name: name.to_string(),
            handle,
            block,
            tab_order: index,
        });
        self.layout_keys.insert(table_key(name), index);
        self.added_objects
            .insert(handle, ObjectRef::Layout(name.to_string()));
        index
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// 表项名称不区分大小写。
fn table_key(name: &str) -> String {
    name.to_ascii_uppercase()
}
