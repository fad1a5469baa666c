//! 活动布局上的图元操作：按类型查看、添加与移除。
//!
//! 文档通过参数显式传入，门面本身只记录当前活动布局。所有操作都是同步的，
//! 视图借用文档，遍历期间无法修改文档。

use std::marker::PhantomData;
use std::slice;

use dxfdoc_core::document::{Block, Document, DocumentError, EntityId, Handle, Layout};
use dxfdoc_core::entity::{
    Arc, AttributeDefinition, Circle, Dimension, Ellipse, EntityVariant, Face3d, Hatch, Image,
    Insert, Leader, Line, LwPolyline, MLine, MText, Mesh, Point, PolyfaceMesh, Polyline, Ray,
    Shape, Solid, Spline, Text, Tolerance, Trace, Underlay, Viewport, Wipeout, XLine,
};
use tracing::debug;

use crate::errors::EntitiesError;

/// 活动布局门面。添加/移除只维护图元的归属关系，不清理因此变为未使用的图层、样式或编组。
#[derive(Debug, Clone)]
pub struct DrawingEntities {
    active_layout: String,
}

impl DrawingEntities {
    /// 以文档的默认布局作为活动布局。
    pub fn new(document: &Document) -> Self {
        Self {
            active_layout: document.default_layout().to_string(),
        }
    }

    #[inline]
    pub fn active_layout(&self) -> &str {
        &self.active_layout
    }

    /// 切换活动布局。布局不存在时返回错误，当前选择保持不变。
    pub fn set_active_layout(
        &mut self,
        document: &Document,
        name: &str,
    ) -> Result<(), EntitiesError> {
        let layout = document
            .layout(name)
            .ok_or_else(|| EntitiesError::LayoutNotFound(name.to_string()))?;
        self.active_layout = layout.name().to_string();
        debug!(layout = %self.active_layout, "已切换活动布局");
        Ok(())
    }

    fn active_block<'a>(&self, document: &'a Document) -> Option<&'a Block> {
        document.layout_block(&self.active_layout)
    }

    /// 活动布局中类型为 `T` 的图元视图。
    pub fn of_kind<'a, T: EntityVariant>(&self, document: &'a Document) -> EntityView<'a, T> {
        EntityView {
            document,
            ids: self.active_block(document).map(Block::entities).unwrap_or(&[]),
            _kind: PhantomData,
        }
    }

    pub fn lines<'a>(&self, document: &'a Document) -> EntityView<'a, Line> {
        self.of_kind(document)
    }

    pub fn circles<'a>(&self, document: &'a Document) -> EntityView<'a, Circle> {
        self.of_kind(document)
    }

    pub fn arcs<'a>(&self, document: &'a Document) -> EntityView<'a, Arc> {
        self.of_kind(document)
    }

    pub fn ellipses<'a>(&self, document: &'a Document) -> EntityView<'a, Ellipse> {
        self.of_kind(document)
    }

    pub fn points<'a>(&self, document: &'a Document) -> EntityView<'a, Point> {
        self.of_kind(document)
    }

    pub fn shapes<'a>(&self, document: &'a Document) -> EntityView<'a, Shape> {
        self.of_kind(document)
    }

    /// 三维多段线，不含多面网格。
    pub fn polylines<'a>(&self, document: &'a Document) -> EntityView<'a, Polyline> {
        self.of_kind(document)
    }

    pub fn polyface_meshes<'a>(&self, document: &'a Document) -> EntityView<'a, PolyfaceMesh> {
        self.of_kind(document)
    }

    pub fn lw_polylines<'a>(&self, document: &'a Document) -> EntityView<'a, LwPolyline> {
        self.of_kind(document)
    }

    pub fn meshes<'a>(&self, document: &'a Document) -> EntityView<'a, Mesh> {
        self.of_kind(document)
    }

    pub fn splines<'a>(&self, document: &'a Document) -> EntityView<'a, Spline> {
        self.of_kind(document)
    }

    pub fn texts<'a>(&self, document: &'a Document) -> EntityView<'a, Text> {
        self.of_kind(document)
    }

    pub fn mtexts<'a>(&self, document: &'a Document) -> EntityView<'a, MText> {
        self.of_kind(document)
    }

    /// 块参照。
    pub fn inserts<'a>(&self, document: &'a Document) -> EntityView<'a, Insert> {
        self.of_kind(document)
    }

    pub fn hatches<'a>(&self, document: &'a Document) -> EntityView<'a, Hatch> {
        self.of_kind(document)
    }

    pub fn dimensions<'a>(&self, document: &'a Document) -> EntityView<'a, Dimension> {
        self.of_kind(document)
    }

    pub fn leaders<'a>(&self, document: &'a Document) -> EntityView<'a, Leader> {
        self.of_kind(document)
    }

    pub fn tolerances<'a>(&self, document: &'a Document) -> EntityView<'a, Tolerance> {
        self.of_kind(document)
    }

    pub fn mlines<'a>(&self, document: &'a Document) -> EntityView<'a, MLine> {
        self.of_kind(document)
    }

    pub fn images<'a>(&self, document: &'a Document) -> EntityView<'a, Image> {
        self.of_kind(document)
    }

    /// 参考底图（DGN / DWF / PDF）。
    pub fn underlays<'a>(&self, document: &'a Document) -> EntityView<'a, Underlay> {
        self.of_kind(document)
    }

    pub fn wipeouts<'a>(&self, document: &'a Document) -> EntityView<'a, Wipeout> {
        self.of_kind(document)
    }

    pub fn faces3d<'a>(&self, document: &'a Document) -> EntityView<'a, Face3d> {
        self.of_kind(document)
    }

    pub fn solids<'a>(&self, document: &'a Document) -> EntityView<'a, Solid> {
        self.of_kind(document)
    }

    pub fn traces<'a>(&self, document: &'a Document) -> EntityView<'a, Trace> {
        self.of_kind(document)
    }

    pub fn rays<'a>(&self, document: &'a Document) -> EntityView<'a, Ray> {
        self.of_kind(document)
    }

    pub fn xlines<'a>(&self, document: &'a Document) -> EntityView<'a, XLine> {
        self.of_kind(document)
    }

    pub fn viewports<'a>(&self, document: &'a Document) -> EntityView<'a, Viewport> {
        self.of_kind(document)
    }

    /// 活动布局关联块中的属性定义，按插入顺序。
    pub fn attribute_definitions<'a>(
        &self,
        document: &'a Document,
    ) -> impl Iterator<Item = &'a AttributeDefinition> + use<'a> {
        self.active_block(document)
            .into_iter()
            .flat_map(Block::attribute_definitions)
    }

    /// 把未附着的图元追加到活动布局。
    ///
    /// 已属于文档的图元返回 [`EntitiesError::AlreadyOwned`]，文档不做任何修改。
    pub fn add(&self, document: &mut Document, id: EntityId) -> Result<Handle, EntitiesError> {
        let object = document
            .entity(id)
            .ok_or(EntitiesError::EntityNotFound(id))?;
        if object.is_attached() {
            return Err(EntitiesError::AlreadyOwned(id));
        }
        let block = document
            .layout(&self.active_layout)
            .map(Layout::block)
            .ok_or_else(|| EntitiesError::LayoutNotFound(self.active_layout.clone()))?;
        let handle = document.append_to_block(block, id).map_err(|err| match err {
            DocumentError::AlreadyOwned(id) => EntitiesError::AlreadyOwned(id),
            DocumentError::EntityNotFound(id) => EntitiesError::EntityNotFound(id),
            _ => EntitiesError::LayoutNotFound(self.active_layout.clone()),
        })?;
        debug!(entity = %id, %handle, layout = %self.active_layout, "图元已添加到活动布局");
        Ok(handle)
    }

    /// 依次添加一组图元，遇到第一个失败即停止并返回该错误。
    /// 之前已添加的图元保留在文档中，不回滚。
    pub fn add_all<I>(
        &self,
        document: &mut Document,
        entities: Option<I>,
    ) -> Result<(), EntitiesError>
    where
        I: IntoIterator<Item = EntityId>,
    {
        let entities = entities.ok_or(EntitiesError::MissingEntities)?;
        for id in entities {
            self.add(document, id)?;
        }
        Ok(())
    }

    /// 从所属布局中移除图元，返回是否实际移除。
    ///
    /// 以下情况返回 `false`：图元不存在、未附着、仍有反应器依赖、属于块定义而非布局、
    /// 句柄未登记在文档中。移除作用于图元的所属块，不一定是活动布局。
    pub fn remove(&self, document: &mut Document, id: EntityId) -> bool {
        let Some(object) = document.entity(id) else {
            return refuse(id, "missing");
        };
        let Some(handle) = object.handle() else {
            return refuse(id, "no_handle");
        };
        let Some(owner) = object.owner() else {
            return refuse(id, "no_owner");
        };
        if !object.reactors().is_empty() {
            return refuse(id, "has_reactors");
        }
        if document.block(owner).and_then(Block::layout).is_none() {
            return refuse(id, "block_definition");
        }
        if !document.contains_handle(handle) {
            return refuse(id, "unregistered_handle");
        }

        let removed = document.remove_from_block(owner, id);
        if removed {
            debug!(entity = %id, %handle, "图元已从布局移除");
        }
        removed
    }

    /// 逐个移除，单个失败不影响其余图元，也不汇总结果。
    pub fn remove_all<I>(
        &self,
        document: &mut Document,
        entities: Option<I>,
    ) -> Result<(), EntitiesError>
    where
        I: IntoIterator<Item = EntityId>,
    {
        let entities = entities.ok_or(EntitiesError::MissingEntities)?;
        for id in entities {
            self.remove(document, id);
        }
        Ok(())
    }
}

fn refuse(id: EntityId, reason: &'static str) -> bool {
    debug!(entity = %id, reason, "图元未移除");
    false
}

/// 活动布局中某一类型图元的惰性视图。
///
/// 视图不做快照：每次调用 [`EntityView::iter`] 都从块序列开头按插入顺序重新过滤。
pub struct EntityView<'a, T> {
    document: &'a Document,
    ids: &'a [EntityId],
    _kind: PhantomData<fn() -> T>,
}

impl<'a, T: EntityVariant + 'a> EntityView<'a, T> {
    pub fn iter(&self) -> ViewIter<'a, T> {
        ViewIter {
            document: self.document,
            ids: self.ids.iter(),
            _kind: PhantomData,
        }
    }

    /// 与 `iter` 顺序一致的图元标识。
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + use<'a, T> {
        let document = self.document;
        self.ids.iter().copied().filter(move |id| {
            document
                .entity(*id)
                .is_some_and(|object| object.kind() == T::KIND)
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<T> Clone for EntityView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            document: self.document,
            ids: self.ids,
            _kind: PhantomData,
        }
    }
}

impl<'a, T: EntityVariant + 'a> IntoIterator for EntityView<'a, T> {
    type Item = &'a T;
    type IntoIter = ViewIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: EntityVariant + 'a> IntoIterator for &EntityView<'a, T> {
    type Item = &'a T;
    type IntoIter = ViewIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ViewIter<'a, T> {
    document: &'a Document,
    ids: slice::Iter<'a, EntityId>,
    _kind: PhantomData<fn() -> T>,
}

impl<'a, T: EntityVariant + 'a> Iterator for ViewIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let document = self.document;
        self.ids
            .by_ref()
            .find_map(|id| document.entity(*id).and_then(|object| object.get::<T>()))
    }
}

#[cfg(test)]
mod tests {
    use dxfdoc_core::entity::{EntityObject, Line};
    use dxfdoc_core::geometry::Point2;

    use super::*;
    use crate::errors::ErrorKind;

    fn line(x: f64) -> EntityObject {
        EntityObject::new(Line::new(Point2::new(x, 0.0), Point2::new(x, 10.0)))
    }

    fn circle(r: f64) -> EntityObject {
        EntityObject::new(Circle::new(Point2::new(0.0, 0.0), r))
    }

    #[test]
    fn active_layout_defaults_to_model_space() {
        let doc = Document::new();
        let entities = DrawingEntities::new(&doc);
        assert_eq!(entities.active_layout(), "Model");
    }

    #[test]
    fn set_active_layout_uses_registered_spelling() {
        let doc = Document::new();
        let mut entities = DrawingEntities::new(&doc);
        entities.set_active_layout(&doc, "layout1").expect("layout exists");
        assert_eq!(entities.active_layout(), "Layout1");

        let err = entities.set_active_layout(&doc, "Missing").unwrap_err();
        assert_eq!(err, EntitiesError::LayoutNotFound("Missing".to_string()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(entities.active_layout(), "Layout1");
    }

    #[test]
    fn views_filter_by_kind_in_insertion_order() {
        let mut doc = Document::new();
        let entities = DrawingEntities::new(&doc);
        let a = doc.create_entity(line(1.0));
        let b = doc.create_entity(circle(2.0));
        let c = doc.create_entity(line(3.0));
        entities.add_all(&mut doc, Some([a, b, c])).expect("add all");

        let xs: Vec<f64> = entities.lines(&doc).iter().map(|l| l.start.x()).collect();
        assert_eq!(xs, [1.0, 3.0]);
        assert_eq!(entities.lines(&doc).ids().collect::<Vec<_>>(), [a, c]);
        assert_eq!(entities.circles(&doc).len(), 1);
        assert!(entities.arcs(&doc).is_empty());
    }

    #[test]
    fn views_are_restartable_and_reflect_later_changes() {
        let mut doc = Document::new();
        let entities = DrawingEntities::new(&doc);
        let first = doc.create_entity(line(0.0));
        entities.add(&mut doc, first).expect("add");

        {
            let view = entities.lines(&doc);
            assert_eq!(view.iter().count(), 1);
            assert_eq!(view.iter().count(), 1);
            assert_eq!((&view).into_iter().count(), 1);
        }

        let second = doc.create_entity(line(5.0));
        entities.add(&mut doc, second).expect("add");
        assert_eq!(entities.lines(&doc).len(), 2);

        assert!(entities.remove(&mut doc, first));
        let remaining: Vec<EntityId> = entities.lines(&doc).ids().collect();
        assert_eq!(remaining, [second]);
    }

    #[test]
    fn views_only_see_the_active_layout() {
        let mut doc = Document::new();
        let mut entities = DrawingEntities::new(&doc);
        let model_line = doc.create_entity(line(0.0));
        entities.add(&mut doc, model_line).expect("add to model");

        entities.set_active_layout(&doc, "Layout1").expect("switch");
        assert!(entities.lines(&doc).is_empty());
        let paper_line = doc.create_entity(line(1.0));
        entities.add(&mut doc, paper_line).expect("add to paper");
        assert_eq!(entities.lines(&doc).ids().collect::<Vec<_>>(), [paper_line]);

        entities.set_active_layout(&doc, "Model").expect("switch back");
        assert_eq!(entities.lines(&doc).ids().collect::<Vec<_>>(), [model_line]);
    }

    #[test]
    fn add_unknown_entity_is_invalid_argument_and_leaves_document_untouched() {
        let mut doc = Document::new();
        let entities = DrawingEntities::new(&doc);
        let kept = doc.create_entity(line(0.0));
        entities.add(&mut doc, kept).expect("add");
        let registered = doc.added_object_count();

        let unknown = Document::new().create_entity(line(1.0));
        let err = entities.add(&mut doc, unknown).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err, EntitiesError::EntityNotFound(unknown));

        assert_eq!(doc.added_object_count(), registered);
        assert_eq!(doc.layout_block("Model").map(Block::len), Some(1));
        assert_eq!(entities.lines(&doc).ids().collect::<Vec<_>>(), [kept]);
    }

    #[test]
    fn polyline_family_views_are_disjoint() {
        let mut doc = Document::new();
        let entities = DrawingEntities::new(&doc);
        let corner = dxfdoc_core::geometry::Point3::new(0.0, 0.0, 0.0);
        let polyline = doc.create_entity(EntityObject::new(Polyline {
            vertices: vec![corner; 3],
            is_closed: false,
        }));
        let mesh = doc.create_entity(EntityObject::new(PolyfaceMesh {
            vertices: vec![corner; 4],
            faces: vec![[1, 2, 3, 4]],
        }));
        entities
            .add_all(&mut doc, Some([polyline, mesh]))
            .expect("add");

        assert_eq!(entities.polylines(&doc).ids().collect::<Vec<_>>(), [polyline]);
        assert_eq!(entities.polyface_meshes(&doc).ids().collect::<Vec<_>>(), [mesh]);
        assert!(entities.meshes(&doc).is_empty());
        assert!(entities.lw_polylines(&doc).is_empty());
    }

    #[test]
    fn remove_refuses_block_definition_members() {
        let mut doc = Document::new();
        let entities = DrawingEntities::new(&doc);
        let block = doc.add_block("Bolt").expect("block");
        let id = doc.create_entity(circle(1.0));
        let handle = doc.append_to_block(block, id).expect("append to definition");

        assert!(!entities.remove(&mut doc, id));
        assert_eq!(doc.entity(id).and_then(EntityObject::handle), Some(handle));
        assert!(doc.block(block).is_some_and(|b| b.contains(id)));
    }

    #[test]
    fn remove_uses_owner_block_not_active_layout() {
        let mut doc = Document::new();
        let mut entities = DrawingEntities::new(&doc);
        let id = doc.create_entity(line(0.0));
        entities.add(&mut doc, id).expect("add to model");

        entities.set_active_layout(&doc, "Layout1").expect("switch");
        assert!(entities.remove(&mut doc, id));
        assert!(doc.layout_block("Model").is_some_and(Block::is_empty));
    }

    #[test]
    fn removed_entity_can_be_added_again() {
        let mut doc = Document::new();
        let entities = DrawingEntities::new(&doc);
        let id = doc.create_entity(line(0.0));
        let first = entities.add(&mut doc, id).expect("add");
        assert!(entities.remove(&mut doc, id));
        assert!(!entities.remove(&mut doc, id));
        let second = entities.add(&mut doc, id).expect("re-add");
        assert_ne!(first, second);
    }

    #[test]
    fn attribute_definitions_follow_active_layout() {
        let mut doc = Document::new();
        let mut entities = DrawingEntities::new(&doc);
        let paper = doc.layout("Layout1").expect("paper").block();
        let sheet = AttributeDefinition::new("SHEET", Point2::new(0.0, 0.0), 3.5);
        doc.add_attribute_definition(paper, sheet)
            .expect("add definition");

        assert_eq!(entities.attribute_definitions(&doc).count(), 0);
        entities.set_active_layout(&doc, "Layout1").expect("switch");
        let tags: Vec<&str> = entities
            .attribute_definitions(&doc)
            .map(|def| def.tag.as_str())
            .collect();
        assert_eq!(tags, ["SHEET"]);
    }
}
