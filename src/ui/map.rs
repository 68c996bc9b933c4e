use eframe::egui::{self, Color32, RichText, Stroke, Ui};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints, Polygon};

use crate::color;
use crate::data::boundary::BoundarySet;
use crate::geo::{self, LonLat, Projection};
use crate::report::map::{
    CHOROPLETH_LAYER, CHOROPLETH_LINE_OPACITY, CIRCLE_FILL_OPACITY, CIRCLE_WEIGHT, Choropleth,
    CircleLayer,
};
use crate::report::metrics::group_float;
use crate::state::AppState;

const MAP_HEIGHT: f32 = 500.0;
const CIRCLE_SEGMENTS: usize = 36;

// ---------------------------------------------------------------------------
// Map panel
// ---------------------------------------------------------------------------

/// Layer control, the map itself, the choropleth legend and the site popup.
pub fn map_panel(ui: &mut Ui, state: &mut AppState) {
    let reset = std::mem::take(&mut state.reset_view);
    let Some(snapshot) = &state.snapshot else {
        return;
    };
    let map = &snapshot.map;
    let projection = Projection::new(state.config.map_center[0]);

    // ---- Layer control ----
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Layers:");
        let names = std::iter::once(CHOROPLETH_LAYER).chain(map.layers.iter().map(|l| l.name));
        for name in names {
            let mut visible = state.layers.is_visible(name);
            if ui.checkbox(&mut visible, name).changed() {
                state.layers.set_visible(name, visible);
            }
        }
        if ui.button("Reset view").clicked() {
            state.reset_view = true;
        }
    });

    let [lon_span, lat_span] = state
        .config
        .initial_span(ui.available_width(), MAP_HEIGHT);
    let [center_lat, center_lon] = state.config.map_center;
    let [cx, cy] = projection.project([center_lon, center_lat]);
    let half_x = lon_span * projection.project([1.0, 0.0])[0] / 2.0;
    let bounds = PlotBounds::from_min_max(
        [cx - half_x, cy - lat_span / 2.0],
        [cx + half_x, cy + lat_span / 2.0],
    );

    let show_choropleth = state.layers.is_visible(CHOROPLETH_LAYER);
    let boundaries = state.boundaries.as_ref();

    let response = Plot::new("provider_map")
        .height(MAP_HEIGHT)
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .show_x(false)
        .show_y(false)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            if reset {
                plot_ui.set_plot_bounds(bounds);
            }
            if let (true, Some(boundaries)) = (show_choropleth, boundaries) {
                for item in choropleth_items(&map.choropleth, boundaries, &projection) {
                    match item {
                        MapItem::Fill(p) => plot_ui.polygon(p),
                        MapItem::Outline(l) => plot_ui.line(l),
                    }
                }
            }
            for layer in map.layers.iter().filter(|l| state.layers.is_visible(l.name)) {
                for polygon in circle_items(layer, &projection) {
                    plot_ui.polygon(polygon);
                }
            }
            plot_ui.pointer_coordinate()
        });

    let pointer: Option<LonLat> = response.inner.map(|p| projection.unproject([p.x, p.y]));

    let clicked_popup = match (response.response.clicked(), pointer) {
        (true, Some(point)) => Some(
            map.popup_at(point, |name| state.layers.is_visible(name))
                .cloned(),
        ),
        _ => None,
    };

    // Tooltip: state name under the pointer.
    if let (true, Some(point), Some(boundaries)) = (show_choropleth, pointer, boundaries) {
        if let Some(region) = boundaries.locate(point) {
            response.response.on_hover_text(region.name.as_str());
        }
    }

    choropleth_legend(ui, &map.choropleth);

    if let Some(popup) = clicked_popup {
        state.popup = popup;
    }
    site_popup(ui, state);
}

// ---------------------------------------------------------------------------
// Plot items
// ---------------------------------------------------------------------------

enum MapItem<'a> {
    Fill(Polygon<'a>),
    Outline(Line<'a>),
}

fn to_plot(ring: &[LonLat], projection: &Projection) -> PlotPoints<'static> {
    ring.iter()
        .map(|p| projection.project(*p))
        .collect::<Vec<[f64; 2]>>()
        .into()
}

/// Filled triangles for states with data, outlines for every state.
fn choropleth_items(
    choropleth: &Choropleth,
    boundaries: &BoundarySet,
    projection: &Projection,
) -> Vec<MapItem<'static>> {
    let outline = color::with_opacity(Color32::BLACK, CHOROPLETH_LINE_OPACITY);
    let mut items = Vec::new();

    for region in choropleth.regions(boundaries) {
        let fill = region
            .value
            .and_then(|_| choropleth.fill_for(&region.boundary.name));
        for polygon in &region.boundary.polygons {
            if let Some(fill) = fill {
                for tri in &polygon.triangles {
                    items.push(MapItem::Fill(
                        Polygon::new(to_plot(tri, projection))
                            .name(choropleth.name)
                            .fill_color(fill)
                            .stroke(Stroke::NONE),
                    ));
                }
            }
            let mut ring = polygon.ring.clone();
            if let Some(first) = ring.first().copied() {
                ring.push(first);
            }
            items.push(MapItem::Outline(
                Line::new(to_plot(&ring, projection))
                    .name(choropleth.name)
                    .color(outline)
                    .width(1.0),
            ));
        }
    }
    items
}

fn circle_items(layer: &CircleLayer, projection: &Projection) -> Vec<Polygon<'static>> {
    let fill = color::with_opacity(layer.color, CIRCLE_FILL_OPACITY);
    layer
        .circles
        .iter()
        .map(|circle| {
            let ring = geo::circle_ring(circle.center, circle.radius_m, CIRCLE_SEGMENTS);
            Polygon::new(to_plot(&ring, projection))
                .name(layer.name)
                .fill_color(fill)
                .stroke(Stroke::new(CIRCLE_WEIGHT, layer.color))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Legend and popup
// ---------------------------------------------------------------------------

fn choropleth_legend(ui: &mut Ui, choropleth: &Choropleth) {
    let Some(scale) = &choropleth.scale else {
        return;
    };
    ui.horizontal_wrapped(|ui: &mut Ui| {
        ui.label(RichText::new(choropleth.name).strong());
        for (lo, hi, c) in scale.legend_entries() {
            ui.label(RichText::new("■").color(c).size(18.0));
            ui.label(format!("{} – {}", group_float(lo.round()), group_float(hi.round())));
        }
    });
}

/// Floating window with the clicked site's details.
fn site_popup(ui: &mut Ui, state: &mut AppState) {
    let Some(popup) = &state.popup else {
        return;
    };
    let mut open = true;
    egui::Window::new("Site")
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .min_width(100.0)
        .max_width(700.0)
        .show(ui.ctx(), |ui: &mut Ui| {
            for line in popup.lines() {
                ui.label(line);
            }
        });
    if !open {
        state.popup = None;
    }
}
