use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_2;

use dxfdoc_core::document::{Document, DocumentError};
use dxfdoc_core::entity::{
    Arc, AttributeDefinition, Circle, Dimension, DimensionKind, EntityObject, Hatch, HatchLoop,
    Insert, Line, Text, Underlay,
};
use dxfdoc_core::geometry::{Point2, Point3};
use dxfdoc_core::underlay::{PathCheck, UnderlayDefinition, UnderlayError, UnderlayKind};
use dxfdoc_engine::entities::DrawingEntities;
use dxfdoc_engine::errors::EntitiesError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Entities(#[from] EntitiesError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Underlay(#[from] UnderlayError),
}

/// 演示结束后活动布局的概览。
#[derive(Debug, Serialize)]
pub struct LayoutSummary {
    pub layout: String,
    pub block: String,
    pub entities: usize,
    pub kinds: BTreeMap<&'static str, usize>,
    pub removed: usize,
    pub retained: usize,
    pub underlays: Vec<UnderlaySummary>,
}

#[derive(Debug, Serialize)]
pub struct UnderlaySummary {
    pub name: String,
    pub kind: UnderlayKind,
    pub file: String,
    pub code_name: &'static str,
    pub path_check: PathCheck,
}

/// 构建一份示例图纸：在活动布局中添加一组图元，移除其中两个（其一被标注依赖），
/// 并修改参考底图路径。
pub fn run(layout: Option<&str>, path_check: PathCheck) -> Result<LayoutSummary, DemoError> {
    let mut doc = Document::new();
    let door = doc.add_block("Door")?;
    let leaf = doc.create_entity(EntityObject::new(Line::new(
        Point2::new(0.0, 0.0),
        Point2::new(0.9, 0.0),
    )));
    doc.append_to_block(door, leaf)?;
    let mark = AttributeDefinition::new("MARK", Point2::new(0.0, 0.2), 0.1);
    doc.add_attribute_definition(door, mark)?;

    let mut entities = DrawingEntities::new(&doc);
    if let Some(name) = layout {
        entities.set_active_layout(&doc, name)?;
    }
    info!(layout = entities.active_layout(), "开始构建演示图元");

    let wall = doc.create_entity(
        EntityObject::new(Line::new(Point2::new(0.0, 0.0), Point2::new(12.0, 0.0)))
            .with_layer("WALL"),
    );
    let partition = doc.create_entity(
        EntityObject::new(Line::new(Point2::new(6.0, 0.0), Point2::new(6.0, 8.0)))
            .with_layer("WALL"),
    );
    let column = doc.create_entity(
        EntityObject::new(Circle::new(Point2::new(3.0, 3.0), 0.4)).with_layer("STRUCT"),
    );
    let swing = doc.create_entity(EntityObject::new(Arc::new(
        Point2::new(6.0, 0.0),
        0.9,
        0.0,
        FRAC_PI_2,
    )));
    let label = doc.create_entity(
        EntityObject::new(Text::new(Point2::new(1.0, 7.0), "平面图", 0.5)).with_layer("ANNOT"),
    );
    let door_ref = doc.create_entity(EntityObject::new(Insert::new("Door", Point2::new(6.0, 0.0))));
    let fill = doc.create_entity(EntityObject::new(Hatch::solid(vec![HatchLoop {
        vertices: vec![
            Point2::new(2.6, 2.6),
            Point2::new(3.4, 2.6),
            Point2::new(3.4, 3.4),
            Point2::new(2.6, 3.4),
        ],
        is_outer: true,
    }])));
    let diameter = doc.create_entity(
        EntityObject::new(Dimension {
            kind: DimensionKind::Diameter,
            definition_point: Point2::new(3.4, 3.0),
            text_midpoint: Point2::new(4.5, 3.5),
            measurement: Some(0.8),
            text_override: None,
        })
        .with_layer("ANNOT"),
    );
    let definition = UnderlayDefinition::with_path_check(
        "site-plan",
        "sheets/plan.pdf",
        UnderlayKind::Pdf,
        path_check,
    )?;
    let underlay = doc.create_entity(
        EntityObject::new(Underlay::new(definition, Point3::new(0.0, 0.0, 0.0))).with_layer("XREF"),
    );

    entities.add_all(
        &mut doc,
        Some([wall, partition, column, swing, label, door_ref, fill, diameter, underlay]),
    )?;

    // 直径标注依赖柱子圆，移除时柱子应被保留。
    if let Some(handle) = doc.entity(diameter).and_then(EntityObject::handle) {
        doc.add_reactor(column, handle)?;
    }
    let targets = [partition, column];
    entities.remove_all(&mut doc, Some(targets))?;
    let retained = targets
        .iter()
        .filter(|id| doc.entity(**id).is_some_and(EntityObject::is_attached))
        .count();
    let removed = targets.len() - retained;
    debug!(removed, retained, "批量移除完成");

    if let Some(payload) = doc.payload_mut::<Underlay>(underlay) {
        payload.definition.set_file("sheets/plan-rev2.PDF")?;
    }

    Ok(summarize(&doc, &entities, removed, retained))
}

fn summarize(
    doc: &Document,
    entities: &DrawingEntities,
    removed: usize,
    retained: usize,
) -> LayoutSummary {
    let block = doc.layout_block(entities.active_layout());
    let mut kinds = BTreeMap::new();
    for id in block.map(|b| b.entities()).unwrap_or(&[]) {
        if let Some(object) = doc.entity(*id) {
            *kinds.entry(object.kind().dxf_name()).or_insert(0) += 1;
        }
    }
    let underlays = entities
        .underlays(doc)
        .iter()
        .map(|underlay| UnderlaySummary {
            name: underlay.definition.name().to_string(),
            kind: underlay.definition.kind(),
            file: underlay.definition.file().to_string(),
            code_name: underlay.definition.code_name(),
            path_check: underlay.definition.path_check(),
        })
        .collect();

    LayoutSummary {
        layout: entities.active_layout().to_string(),
        block: block.map(|b| b.name().to_string()).unwrap_or_default(),
        entities: block.map(|b| b.len()).unwrap_or_default(),
        kinds,
        removed,
        retained,
        underlays,
    }
}
