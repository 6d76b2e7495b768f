//! Rasterizes styled OSM data for one view.
//!
//! The projection is linear in degrees. A view of `size` pixels centred on
//! `center` spans `100 · size / (RENDER_SCALE · zoom_factor)` degrees in both
//! directions, north up.

use image::RgbaImage;
use tiny_skia::{
    Color as SkiaColor, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Shader, Stroke,
    Transform,
};
use tracing::debug;

use crate::error::TileError;
use crate::mapcss::{Color, ElementKind, Style, StyleSheet};
use crate::osm::OsmDocument;

/// Pixels per degree per unit of zoom factor, divided by 100.
pub const RENDER_SCALE: f64 = 9105.7453358554949742220244056229;

/// Stroke width used when a styled way sets a color but no width.
const DEFAULT_WIDTH: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// What to draw: a square of `size` pixels around `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub center: GeoPoint,
    pub zoom_factor: f64,
    pub size: u32,
}

impl RenderView {
    /// Degrees covered by the view along either axis.
    pub fn span(&self) -> f64 {
        100.0 * self.size as f64 / (RENDER_SCALE * self.zoom_factor)
    }

    /// Pixel position of `point`; (0, 0) is the north-west corner.
    pub fn to_pixel(&self, point: GeoPoint) -> (f32, f32) {
        let span = self.span();
        let scale = self.size as f64 / span;
        let west = self.center.lon - span / 2.0;
        let north = self.center.lat + span / 2.0;
        (
            ((point.lon - west) * scale) as f32,
            ((north - point.lat) * scale) as f32,
        )
    }
}

/// Renders views of some map data.
pub trait MapRenderer: Send + Sync {
    fn render(&self, view: &RenderView) -> Result<RgbaImage, TileError>;
}

enum Shape {
    Line(Vec<GeoPoint>),
    Polygon(Vec<GeoPoint>),
    Symbol(GeoPoint),
}

struct Drawable {
    shape: Shape,
    style: Style,
}

/// Renders an OSM document with `tiny-skia`.
///
/// Styles are resolved once up front; each render only projects and paints.
pub struct SkiaMapRenderer {
    background: Color,
    drawables: Vec<Drawable>,
}

impl SkiaMapRenderer {
    pub fn new(document: &OsmDocument, stylesheet: &StyleSheet) -> Self {
        let mut drawables = Vec::new();

        for way in document.ways() {
            let kind = if way.is_closed() {
                ElementKind::Area
            } else {
                ElementKind::Way
            };
            let style = stylesheet.style_for(kind, &way.tags);
            if style.is_empty() {
                continue;
            }
            let points: Vec<GeoPoint> = document
                .way_nodes(way)
                .map(|n| GeoPoint::new(n.lat, n.lon))
                .collect();
            if points.len() < 2 {
                continue;
            }
            let shape = if kind == ElementKind::Area {
                Shape::Polygon(points)
            } else {
                Shape::Line(points)
            };
            drawables.push(Drawable { shape, style });
        }

        for node in document.nodes() {
            if node.tags.is_empty() {
                continue;
            }
            let style = stylesheet.style_for(ElementKind::Node, &node.tags);
            if style.symbol_size.is_some() {
                drawables.push(Drawable {
                    shape: Shape::Symbol(GeoPoint::new(node.lat, node.lon)),
                    style,
                });
            }
        }

        // Stable: equal z-index keeps areas, then ways, then nodes in file order.
        drawables.sort_by(|a, b| a.style.z_index.total_cmp(&b.style.z_index));
        debug!(drawables = drawables.len(), "Prepared map renderer");

        Self {
            background: stylesheet.canvas_background().unwrap_or(Color::WHITE),
            drawables,
        }
    }

    fn draw(&self, pixmap: &mut Pixmap, drawable: &Drawable, view: &RenderView) {
        let style = &drawable.style;
        match &drawable.shape {
            Shape::Polygon(points) => {
                let Some(path) = polyline(points, view, true) else {
                    return;
                };
                if let Some(fill) = style.fill_color {
                    let paint = paint(fill, style.fill_opacity.unwrap_or(1.0));
                    pixmap.fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
                }
                if let Some(color) = style.color {
                    stroke(pixmap, &path, color, style);
                }
            }
            Shape::Line(points) => {
                if let (Some(color), Some(path)) = (style.color, polyline(points, view, false)) {
                    stroke(pixmap, &path, color, style);
                }
            }
            Shape::Symbol(point) => {
                let (x, y) = view.to_pixel(*point);
                let radius = style.symbol_size.unwrap_or(0.0) / 2.0;
                if radius <= 0.0 {
                    return;
                }
                if let Some(path) = PathBuilder::from_circle(x, y, radius) {
                    let fill = style.symbol_fill_color.or(style.color).unwrap_or(Color::BLACK);
                    let paint = paint(fill, style.opacity.unwrap_or(1.0));
                    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
        }
    }
}

impl MapRenderer for SkiaMapRenderer {
    fn render(&self, view: &RenderView) -> Result<RgbaImage, TileError> {
        let mut pixmap = Pixmap::new(view.size, view.size)
            .ok_or_else(|| TileError::Render(format!("cannot allocate a {0}x{0} canvas", view.size)))?;
        let bg = self.background;
        pixmap.fill(SkiaColor::from_rgba8(bg.r, bg.g, bg.b, 255));

        for drawable in &self.drawables {
            self.draw(&mut pixmap, drawable, view);
        }

        let data: Vec<u8> = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        RgbaImage::from_raw(view.size, view.size, data)
            .ok_or_else(|| TileError::Render("canvas size mismatch".to_string()))
    }
}

fn paint(color: Color, opacity: f32) -> Paint<'static> {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    Paint {
        shader: Shader::SolidColor(SkiaColor::from_rgba8(color.r, color.g, color.b, alpha)),
        anti_alias: true,
        ..Default::default()
    }
}

fn stroke(pixmap: &mut Pixmap, path: &tiny_skia::Path, color: Color, style: &Style) {
    let width = style.width.unwrap_or(DEFAULT_WIDTH);
    if width <= 0.0 {
        return;
    }
    let paint = paint(color, style.opacity.unwrap_or(1.0));
    pixmap.stroke_path(
        path,
        &paint,
        &Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        },
        Transform::identity(),
        None,
    );
}

fn polyline(points: &[GeoPoint], view: &RenderView, close: bool) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    let mut iter = points.iter().map(|p| view.to_pixel(*p));
    let (x, y) = iter.next()?;
    builder.move_to(x, y);
    for (x, y) in iter {
        builder.line_to(x, y);
    }
    if close {
        builder.close();
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"<osm>
  <node id="1" lat="-1" lon="-1"/>
  <node id="2" lat="-1" lon="1"/>
  <node id="3" lat="1" lon="1"/>
  <node id="4" lat="1" lon="-1"/>
  <node id="5" lat="0.5" lon="-0.5"><tag k="amenity" v="cafe"/></node>
  <way id="10">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
    <tag k="landuse" v="grass"/>
  </way>
</osm>"#;

    const STYLE: &str = r#"
canvas { background-color: #0000ff; }
area[landuse=grass] { fill-color: #00ff00; }
node[amenity] { symbol-size: 10; symbol-fill-color: #ff0000; z-index: 5; }
"#;

    fn renderer() -> SkiaMapRenderer {
        let doc = OsmDocument::parse(DATA.as_bytes()).unwrap();
        let sheet = StyleSheet::parse(STYLE).unwrap();
        SkiaMapRenderer::new(&doc, &sheet)
    }

    /// A 100 px view spanning 4 degrees around the origin.
    fn view() -> RenderView {
        RenderView {
            center: GeoPoint::new(0.0, 0.0),
            zoom_factor: 100.0 * 100.0 / (RENDER_SCALE * 4.0),
            size: 100,
        }
    }

    #[test]
    fn test_view_projection() {
        let view = view();
        assert!((view.span() - 4.0).abs() < 1e-9);

        let (x, y) = view.to_pixel(GeoPoint::new(2.0, -2.0));
        assert!(x.abs() < 1e-3 && y.abs() < 1e-3);

        let (x, y) = view.to_pixel(GeoPoint::new(-1.0, 1.0));
        assert!((x - 75.0).abs() < 1e-3 && (y - 75.0).abs() < 1e-3);
    }

    #[test]
    fn test_render_draws_area_symbol_and_background() {
        let image = renderer().render(&view()).unwrap();
        assert_eq!(image.dimensions(), (100, 100));

        // Outside the square: canvas background
        assert_eq!(image.get_pixel(5, 5).0, [0, 0, 255, 255]);
        // Inside the grass area
        assert_eq!(image.get_pixel(60, 60).0, [0, 255, 0, 255]);
        // Cafe symbol at (37.5, 37.5), drawn above the area
        assert_eq!(image.get_pixel(37, 37).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_default_background_is_white() {
        let doc = OsmDocument::parse(DATA.as_bytes()).unwrap();
        let renderer = SkiaMapRenderer::new(&doc, &StyleSheet::default());
        let image = renderer.render(&view()).unwrap();
        assert!(image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_zero_size_view_fails() {
        let view = RenderView { size: 0, ..view() };
        assert!(matches!(renderer().render(&view), Err(TileError::Render(_))));
    }
}
