//! Glyph rendering of layouts and parsing of glyph grids.
//!
//! The textual surface is bit-exact and shared with warm starts: columns
//! left-to-right encode increasing `x`, rows top-to-bottom encode decreasing
//! `y` (row 0 prints the northernmost row), one character per cell.

use core_grid::{Component, Layout};
use thiserror::Error;

pub const EMPTY_GLYPH: char = '‧';

// Component glyphs indexed by Dir (N, S, E, W table order).
const BELT: [char; 4] = ['▲', '▼', '▶', '◀'];
const MIXER_ANCHOR: [char; 4] = ['↿', '⇂', '⇀', '↽'];
const MIXER_COMPANION: [char; 4] = ['↾', '⇃', '⇁', '↼'];
const TUNNEL_ENTRANCE: [char; 4] = ['△', '▽', '▷', '◁'];
const TUNNEL_EXIT: [char; 4] = ['↥', '↧', '↦', '↤'];

/// Glyph for one component.
pub fn glyph(component: Component) -> char {
    match component {
        Component::Empty => EMPTY_GLYPH,
        Component::Belt(d) => BELT[d.index()],
        Component::MixerAnchor(d) => MIXER_ANCHOR[d.index()],
        Component::MixerCompanion(d) => MIXER_COMPANION[d.index()],
        Component::TunnelEntrance(d) => TUNNEL_ENTRANCE[d.index()],
        Component::TunnelExit(d) => TUNNEL_EXIT[d.index()],
    }
}

/// Component for one glyph, or `None` for characters outside the alphabet.
pub fn component(glyph: char) -> Option<Component> {
    if glyph == EMPTY_GLYPH {
        return Some(Component::Empty);
    }
    for d in core_grid::DIRECTIONS {
        let i = d.index();
        if glyph == BELT[i] {
            return Some(Component::Belt(d));
        }
        if glyph == MIXER_ANCHOR[i] {
            return Some(Component::MixerAnchor(d));
        }
        if glyph == MIXER_COMPANION[i] {
            return Some(Component::MixerCompanion(d));
        }
        if glyph == TUNNEL_ENTRANCE[i] {
            return Some(Component::TunnelEntrance(d));
        }
        if glyph == TUNNEL_EXIT[i] {
            return Some(Component::TunnelExit(d));
        }
    }
    None
}

/// Render a layout as a glyph grid, rows separated by a line feed and no
/// trailing line feed.
pub fn render(layout: &Layout) -> String {
    let mut out = String::with_capacity((layout.width() * layout.height() * 4) as usize);
    let mut row = layout.height() - 1;
    for (_, y, component) in layout.rows_north_first() {
        if y != row {
            out.push('\n');
            row = y;
        }
        out.push(glyph(component));
    }
    out
}

/// A glyph grid that cannot be interpreted against the declared dimensions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GlyphError {
    #[error("glyph grid holds {found} cells, expected {expected}")]
    WrongSize { expected: usize, found: usize },
    #[error("unknown glyph {glyph:?} at row {row}, column {column}")]
    UnknownGlyph {
        glyph: char,
        row: usize,
        column: usize,
    },
}

/// Parse a glyph grid back into a layout.
///
/// Line feeds are ignored wherever they appear; the remaining character count
/// must equal `width * height` exactly.
pub fn parse(text: &str, width: i32, height: i32) -> Result<Layout, GlyphError> {
    let cells: Vec<char> = text.chars().filter(|&c| c != '\n').collect();
    let expected = (width * height) as usize;
    if cells.len() != expected {
        return Err(GlyphError::WrongSize {
            expected,
            found: cells.len(),
        });
    }
    let mut layout = Layout::new(width, height);
    let mut chars = cells.into_iter();
    for row in 0..height {
        let y = height - 1 - row;
        for x in 0..width {
            let glyph = chars.next().expect("cell count checked above");
            let component = component(glyph).ok_or(GlyphError::UnknownGlyph {
                glyph,
                row: row as usize,
                column: x as usize,
            })?;
            layout.set(x, y, component);
        }
    }
    Ok(layout)
}
