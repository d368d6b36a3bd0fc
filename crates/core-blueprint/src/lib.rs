//! Blueprint exchange-string export.
//!
//! Turns a solved [`Layout`] into the JSON document a blueprint-importing
//! tool expects, then into the exchange string: compact JSON, zlib-deflated,
//! base64-encoded (standard alphabet, padded), prefixed with the version
//! character `'0'`.

use std::io::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use core_grid::{Component, Dir, Layout, mixer};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Encoded game version carried by every blueprint (1.1.0).
pub const BLUEPRINT_VERSION: u64 = 281_479_276_344_320;

const VERSION_PREFIX: char = '0';

/// Direction codes on the export surface: N 0, E 2, S 4, W 6.
pub fn direction_code(d: Dir) -> u8 {
    const TABLE: [u8; 4] = [0, 4, 2, 6];
    TABLE[d.index()]
}

/// A coordinate that serializes as an integer when it is whole, matching the
/// reference encoding (`0`, not `0.0`; splitters sit on half cells).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord(pub f64);

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.fract() == 0.0 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Position {
    pub x: Coord,
    pub y: Coord,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Entity {
    pub entity_number: u32,
    pub name: &'static str,
    pub position: Position,
    /// Only underground belts carry this: `"input"` or `"output"`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub direction: u8,
}

#[derive(Debug, Serialize)]
struct Signal {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct Icon {
    signal: Signal,
    index: u32,
}

#[derive(Debug, Serialize)]
pub struct Blueprint {
    item: &'static str,
    label: String,
    icons: Vec<Icon>,
    entities: Vec<Entity>,
    version: u64,
}

/// The top-level document, `{"blueprint": {...}}`.
#[derive(Debug, Serialize)]
pub struct BlueprintDocument {
    blueprint: Blueprint,
}

/// Fatal export failures. There is no fallback representation.
#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("blueprint serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("blueprint compression failed: {0}")]
    Compress(#[from] std::io::Error),
}

/// Entity records for a layout, numbered from 1 in display order (north row
/// first). The exported `y` axis is inverted: `y_export = H - 1 - y`.
pub fn entities(layout: &Layout) -> Vec<Entity> {
    let height = layout.height();
    let export = |x: f64, y: f64| Position {
        x: Coord(x),
        y: Coord(f64::from(height - 1) - y),
    };
    let mut out: Vec<Entity> = Vec::new();
    for (x, y, component) in layout.rows_north_first() {
        let next_number = out.len() as u32 + 1;
        let entity = match component {
            Component::Empty | Component::MixerCompanion(_) => continue,
            Component::Belt(d) => Entity {
                entity_number: next_number,
                name: "transport-belt",
                position: export(f64::from(x), f64::from(y)),
                kind: None,
                direction: direction_code(d),
            },
            Component::MixerAnchor(d) => {
                // A splitter occupies both mixer cells; its position is their
                // midpoint, half a cell off-grid perpendicular to the output.
                let (cx, cy) = mixer::companion(x, y, d);
                Entity {
                    entity_number: next_number,
                    name: "splitter",
                    position: export(
                        f64::from(x + cx) / 2.0,
                        f64::from(y + cy) / 2.0,
                    ),
                    kind: None,
                    direction: direction_code(d),
                }
            }
            Component::TunnelEntrance(d) => Entity {
                entity_number: next_number,
                name: "underground-belt",
                position: export(f64::from(x), f64::from(y)),
                kind: Some("input"),
                direction: direction_code(d),
            },
            Component::TunnelExit(d) => Entity {
                entity_number: next_number,
                name: "underground-belt",
                position: export(f64::from(x), f64::from(y)),
                kind: Some("output"),
                direction: direction_code(d),
            },
        };
        out.push(entity);
    }
    out
}

/// Assemble the full document for a layout.
pub fn document(layout: &Layout, label: &str) -> BlueprintDocument {
    BlueprintDocument {
        blueprint: Blueprint {
            item: "blueprint",
            label: label.to_owned(),
            icons: vec![Icon {
                signal: Signal {
                    kind: "item",
                    name: "transport-belt",
                },
                index: 1,
            }],
            entities: entities(layout),
            version: BLUEPRINT_VERSION,
        },
    }
}

/// Encode a document as an exchange string.
pub fn encode(document: &BlueprintDocument) -> Result<String, BlueprintError> {
    let json = serde_json::to_string(document)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.as_bytes())?;
    let compressed = encoder.finish()?;
    let mut out = String::with_capacity(compressed.len() * 4 / 3 + 2);
    out.push(VERSION_PREFIX);
    out.push_str(&BASE64.encode(compressed));
    Ok(out)
}

/// Layout straight to exchange string.
pub fn exchange_string(layout: &Layout, label: &str) -> Result<String, BlueprintError> {
    encode(&document(layout, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn layout_from(text: &str, width: i32, height: i32) -> Layout {
        let mut layout = Layout::new(width, height);
        let mut chars = text.chars().filter(|&c| c != '\n');
        for row in 0..height {
            for x in 0..width {
                let glyph = chars.next().unwrap();
                let component = match glyph {
                    '‧' => Component::Empty,
                    '▲' => Component::Belt(Dir::North),
                    '▶' => Component::Belt(Dir::East),
                    '↿' => Component::MixerAnchor(Dir::North),
                    '↾' => Component::MixerCompanion(Dir::North),
                    '⇀' => Component::MixerAnchor(Dir::East),
                    '⇁' => Component::MixerCompanion(Dir::East),
                    '△' => Component::TunnelEntrance(Dir::North),
                    '↥' => Component::TunnelExit(Dir::North),
                    other => panic!("glyph {other:?} not used in these tests"),
                };
                layout.set(x, height - 1 - row, component);
            }
        }
        layout
    }

    #[test]
    fn direction_codes_follow_the_export_convention() {
        assert_eq!(direction_code(Dir::North), 0);
        assert_eq!(direction_code(Dir::East), 2);
        assert_eq!(direction_code(Dir::South), 4);
        assert_eq!(direction_code(Dir::West), 6);
    }

    #[test]
    fn single_belt_document_is_exact() {
        let layout = layout_from("▲", 1, 1);
        let json = serde_json::to_string(&document(&layout, "Belt balancer")).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"blueprint":{"item":"blueprint","label":"Belt balancer","#,
                r#""icons":[{"signal":{"type":"item","name":"transport-belt"},"index":1}],"#,
                r#""entities":[{"entity_number":1,"name":"transport-belt","#,
                r#""position":{"x":0,"y":0},"direction":0}],"#,
                r#""version":281479276344320}}"#
            )
        );
    }

    #[test]
    fn export_inverts_rows_and_numbers_in_display_order() {
        // Two belts stacked vertically: the northern one exports y = 0.
        let layout = layout_from("▲\n▲", 1, 2);
        let entities = entities(&layout);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_number, 1);
        assert_eq!(entities[0].position, Position { x: Coord(0.0), y: Coord(0.0) });
        assert_eq!(entities[1].entity_number, 2);
        assert_eq!(entities[1].position, Position { x: Coord(0.0), y: Coord(1.0) });
    }

    #[test]
    fn splitter_sits_between_its_two_cells() {
        // Horizontal pair, output north: midpoint is half a cell east.
        let north = entities(&layout_from("↿↾", 2, 1));
        assert_eq!(north.len(), 1);
        assert_eq!(north[0].name, "splitter");
        assert_eq!(north[0].position, Position { x: Coord(0.5), y: Coord(0.0) });
        assert_eq!(north[0].direction, 0);

        // Vertical pair, output east: anchor on top, midpoint half a cell
        // below it on the export axis.
        let east = entities(&layout_from("⇀\n⇁", 1, 2));
        assert_eq!(east.len(), 1);
        assert_eq!(east[0].position, Position { x: Coord(0.0), y: Coord(0.5) });
        assert_eq!(east[0].direction, 2);
    }

    #[test]
    fn underground_belts_carry_their_endpoint_type() {
        let layout = layout_from("↥\n‧\n△", 1, 3);
        let entities = entities(&layout);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name, "underground-belt");
        assert_eq!(entities[0].kind, Some("output"));
        assert_eq!(entities[1].kind, Some("input"));
        let json = serde_json::to_string(&entities[1]).unwrap();
        assert_eq!(
            json,
            r#"{"entity_number":2,"name":"underground-belt","position":{"x":0,"y":2},"type":"input","direction":0}"#
        );
    }

    #[test]
    fn exchange_string_roundtrips_through_zlib() {
        let layout = layout_from("▲▶", 2, 1);
        let encoded = exchange_string(&layout, "Belt balancer").unwrap();
        assert!(encoded.starts_with('0'));
        let compressed = BASE64.decode(&encoded[1..]).unwrap();
        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_slice());
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();
        assert_eq!(
            json,
            serde_json::to_string(&document(&layout, "Belt balancer")).unwrap()
        );
    }
}
