//! 图元记录：公共字段（图层、句柄、所属块、反应器）与按类型区分的数据载荷。

use serde::{Deserialize, Serialize};

use crate::document::{BlockId, Handle};
use crate::geometry::{Point2, Point3, Vector2, Vector3};
use crate::underlay::UnderlayDefinition;

/// 所有具体图元载荷实现的公共接口，提供运行时类型判别与向下转换。
pub trait EntityVariant: Sized {
    const KIND: EntityKind;

    fn from_entity(entity: &Entity) -> Option<&Self>;

    fn from_entity_mut(entity: &mut Entity) -> Option<&mut Self>;

    fn into_entity(self) -> Entity;
}

macro_rules! entity_variants {
    ($($variant:ident => $dxf_name:literal),+ $(,)?) => {
        /// 图元类型判别值，封闭集合。
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum EntityKind {
            $($variant,)+
        }

        impl EntityKind {
            pub const ALL: &'static [EntityKind] = &[$(EntityKind::$variant,)+];

            /// DXF 中的实体类型名。
            pub fn dxf_name(self) -> &'static str {
                match self {
                    $(EntityKind::$variant => $dxf_name,)+
                }
            }
        }

        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub enum Entity {
            $($variant($variant),)+
        }

        impl Entity {
            #[inline]
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Entity::$variant(_) => EntityKind::$variant,)+
                }
            }
        }

        $(
            impl EntityVariant for $variant {
                const KIND: EntityKind = EntityKind::$variant;

                #[inline]
                fn from_entity(entity: &Entity) -> Option<&Self> {
                    match entity {
                        Entity::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                #[inline]
                fn from_entity_mut(entity: &mut Entity) -> Option<&mut Self> {
                    match entity {
                        Entity::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                #[inline]
                fn into_entity(self) -> Entity {
                    Entity::$variant(self)
                }
            }

            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )+
    };
}

entity_variants! {
    Line => "LINE",
    Circle => "CIRCLE",
    Arc => "ARC",
    Ellipse => "ELLIPSE",
    Point => "POINT",
    Shape => "SHAPE",
    Polyline => "POLYLINE",
    PolyfaceMesh => "POLYLINE",
    LwPolyline => "LWPOLYLINE",
    Mesh => "MESH",
    Spline => "SPLINE",
    Text => "TEXT",
    MText => "MTEXT",
    Insert => "INSERT",
    Hatch => "HATCH",
    Dimension => "DIMENSION",
    Leader => "LEADER",
    Tolerance => "TOLERANCE",
    MLine => "MLINE",
    Image => "IMAGE",
    Underlay => "UNDERLAY",
    Wipeout => "WIPEOUT",
    Face3d => "3DFACE",
    Solid => "SOLID",
    Trace => "TRACE",
    Ray => "RAY",
    XLine => "XLINE",
    Viewport => "VIEWPORT",
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dxf_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub start: Point2,
    pub end: Point2,
}

impl Line {
    #[inline]
    pub fn new(start: Point2, end: Point2) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2,
    pub radius: f64,
}

impl Circle {
    #[inline]
    pub fn new(center: Point2, radius: f64) -> Self {
        Self { center, radius }
    }
}

/// 圆弧，角度以弧度表示，按逆时针从起始角到终止角。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Arc {
    #[inline]
    pub fn new(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point2,
    pub major_axis: Vector2,
    pub ratio: f64,
    pub start_parameter: f64,
    pub end_parameter: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub position: Point3,
}

impl Point {
    #[inline]
    pub fn new(position: Point3) -> Self {
        Self { position }
    }
}

/// 形（SHAPE），按名称引用形文件中的定义。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub position: Point3,
    pub size: f64,
    pub rotation: f64,
}

/// 三维多段线（POLYLINE），顶点不带凸度。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<Point3>,
    pub is_closed: bool,
}

/// 多面网格。DXF 中同样以 POLYLINE 写出。
///
/// 面以四个顶点索引表示：从 1 开始，0 表示未使用，负数表示该边不可见。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolyfaceMesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<[i16; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<Vec<usize>>,
    pub subdivision_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub position: Point2,
    pub bulge: f64,
}

impl PolylineVertex {
    #[inline]
    pub fn new(position: Point2) -> Self {
        Self {
            position,
            bulge: 0.0,
        }
    }

    #[inline]
    pub fn with_bulge(position: Point2, bulge: f64) -> Self {
        Self { position, bulge }
    }
}

/// 轻量多段线（LWPOLYLINE），顶点凸度沿用 DXF 语义。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LwPolyline {
    pub vertices: Vec<PolylineVertex>,
    pub is_closed: bool,
}

impl LwPolyline {
    pub fn new<I>(points: I, is_closed: bool) -> Self
    where
        I: IntoIterator<Item = Point2>,
    {
        Self {
            vertices: points.into_iter().map(PolylineVertex::new).collect(),
            is_closed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spline {
    pub degree: i32,
    pub control_points: Vec<Point2>,
    pub knots: Vec<f64>,
    pub fit_points: Vec<Point2>,
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub insert: Point2,
    pub content: String,
    pub height: f64,
    pub rotation: f64,
    pub style: Option<String>,
}

impl Text {
    pub fn new(insert: Point2, content: impl Into<String>, height: f64) -> Self {
        Self {
            insert,
            content: content.into(),
            height,
            rotation: 0.0,
            style: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MText {
    pub insert: Point2,
    pub content: String,
    pub height: f64,
    pub reference_width: Option<f64>,
    pub style: Option<String>,
}

/// 块参照上携带的属性值。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub tag: String,
    pub text: String,
    pub insert: Point2,
    pub height: f64,
}

/// 块参照（INSERT），通过名称引用块定义。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insert {
    pub block_name: String,
    pub insert: Point2,
    pub scale: Vector2,
    pub rotation: f64,
    pub attributes: Vec<Attribute>,
}

impl Insert {
    pub fn new(block_name: impl Into<String>, insert: Point2) -> Self {
        Self {
            block_name: block_name.into(),
            insert,
            scale: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HatchLoop {
    pub vertices: Vec<Point2>,
    pub is_outer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hatch {
    pub pattern_name: String,
    pub is_solid: bool,
    pub loops: Vec<HatchLoop>,
}

impl Hatch {
    pub fn solid(loops: Vec<HatchLoop>) -> Self {
        Self {
            pattern_name: "SOLID".to_string(),
            is_solid: true,
            loops,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionKind {
    Linear,
    Aligned,
    Angular,
    Diameter,
    Radius,
    Ordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub kind: DimensionKind,
    pub definition_point: Point2,
    pub text_midpoint: Point2,
    pub measurement: Option<f64>,
    pub text_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leader {
    pub vertices: Vec<Point2>,
    pub has_arrowhead: bool,
}

/// 形位公差框，`value` 保存 DXF 中的原始控制串。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tolerance {
    pub position: Point3,
    pub value: String,
    pub direction: Vector3,
}

/// 多线，按名称引用多线样式。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLine {
    pub vertices: Vec<Point3>,
    pub style: String,
    pub scale: f64,
    pub is_closed: bool,
}

/// 光栅图像，按名称引用图像定义。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub definition_name: String,
    pub insert: Point2,
    pub u_vector: Vector2,
    pub v_vector: Vector2,
    pub size: Vector2,
}

/// 参考底图（DGN / DWF / PDF），定义以值的形式附着在图元上。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Underlay {
    pub definition: UnderlayDefinition,
    pub insert: Point3,
    pub scale: Vector3,
    pub rotation: f64,
    pub contrast: u8,
    pub fade: u8,
}

impl Underlay {
    pub fn new(definition: UnderlayDefinition, insert: Point3) -> Self {
        Self {
            definition,
            insert,
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: 0.0,
            contrast: 50,
            fade: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wipeout {
    pub vertices: Vec<Point2>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face3d {
    pub vertices: [Point3; 4],
    pub invisible_edges: [bool; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solid {
    pub vertices: [Point2; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub vertices: [Point2; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vector3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XLine {
    pub origin: Point3,
    pub direction: Vector3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub center: Point2,
    pub width: f64,
    pub height: f64,
}

/// 块定义中的属性定义，以标签为键存放。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub tag: String,
    pub prompt: Option<String>,
    pub default_text: String,
    pub insert: Point2,
    pub height: f64,
    pub is_invisible: bool,
    pub is_constant: bool,
}

impl AttributeDefinition {
    pub fn new(tag: impl Into<String>, insert: Point2, height: f64) -> Self {
        Self {
            tag: tag.into(),
            prompt: None,
            default_text: String::new(),
            insert,
            height,
            is_invisible: false,
            is_constant: false,
        }
    }
}

/// 图元公共记录。
///
/// `owner` 与 `handle` 只由文档的块追加/移除路径写入，二者同时为空或同时非空；
/// 非空时句柄一定登记在文档的已添加对象表中。`reactors` 记录依赖此图元的对象句柄。
#[derive(Debug, Serialize)]
pub struct EntityObject {
    layer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    handle: Option<Handle>,
    #[serde(skip)]
    owner: Option<BlockId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reactors: Vec<Handle>,
    data: Entity,
}

impl EntityObject {
    /// 创建一个未附着的图元，默认放在 `0` 图层。
    pub fn new(data: impl Into<Entity>) -> Self {
        Self {
            layer: "0".to_string(),
            handle: None,
            owner: None,
            reactors: Vec::new(),
            data: data.into(),
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    #[inline]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn set_layer(&mut self, layer: impl Into<String>) {
        self.layer = layer.into();
    }

    #[inline]
    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    #[inline]
    pub fn owner(&self) -> Option<BlockId> {
        self.owner
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }

    #[inline]
    pub fn reactors(&self) -> &[Handle] {
        &self.reactors
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    #[inline]
    pub fn data(&self) -> &Entity {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut Entity {
        &mut self.data
    }

    /// 按具体类型取出载荷，类型不符时返回 `None`。
    #[inline]
    pub fn get<T: EntityVariant>(&self) -> Option<&T> {
        T::from_entity(&self.data)
    }

    #[inline]
    pub fn get_mut<T: EntityVariant>(&mut self) -> Option<&mut T> {
        T::from_entity_mut(&mut self.data)
    }

    /// 复制图元数据与图层，不复制句柄、所属块与反应器。
    pub fn detached_copy(&self) -> Self {
        Self {
            layer: self.layer.clone(),
            handle: None,
            owner: None,
            reactors: Vec::new(),
            data: self.data.clone(),
        }
    }

    pub(crate) fn attach(&mut self, owner: BlockId, handle: Handle) {
        self.owner = Some(owner);
        self.handle = Some(handle);
    }

    pub(crate) fn detach(&mut self) {
        self.owner = None;
        self.handle = None;
    }

    pub(crate) fn add_reactor(&mut self, reactor: Handle) -> bool {
        if self.reactors.contains(&reactor) {
            return false;
        }
        self.reactors.push(reactor);
        true
    }

    pub(crate) fn remove_reactor(&mut self, reactor: Handle) -> bool {
        let before = self.reactors.len();
        self.reactors.retain(|existing| *existing != reactor);
        self.reactors.len() != before
    }
}
