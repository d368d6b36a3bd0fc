//! Warm starts: glyph grids turned into variable pins.
//!
//! A *seed* pins placements as hard constraints; a *hint* only suggests them
//! to the search. Pins are deduplicated by variable name across the seed and
//! every hint grid, so overlapping grids never pin the same variable twice.

use core_grid::Component;
use core_render::GlyphError;
use tracing::debug;
use z3::ast::Bool;

use crate::model::{LayoutModel, belt_name, dir_name, mixer_name, tun_in_name, tun_out_name};

impl<'ctx> LayoutModel<'ctx> {
    /// Parse `text` against the model's grid and pin every placement it
    /// shows. Empty cells and mixer companions carry no pin of their own; the
    /// anchor's pin covers the pair.
    pub(crate) fn pin_grid(&mut self, text: &str, hard: bool) -> Result<(), GlyphError> {
        let layout = core_render::parse(text, self.width, self.height)?;
        let mut applied = 0usize;
        for (x, y, component) in layout.rows_north_first() {
            let pins: Vec<(String, Bool<'ctx>)> = match component {
                Component::Empty | Component::MixerCompanion(_) => continue,
                Component::Belt(d) => vec![
                    (belt_name(x, y), self.belt_at(x, y).clone()),
                    (dir_name(x, y, d), self.dir_at(x, y, d).clone()),
                ],
                Component::MixerAnchor(d) => vec![
                    (mixer_name(x, y), self.mixer_at(x, y).clone()),
                    (dir_name(x, y, d), self.dir_at(x, y, d).clone()),
                ],
                Component::TunnelEntrance(d) => vec![
                    (tun_in_name(x, y), self.tun_in_at(x, y).clone()),
                    (dir_name(x, y, d), self.dir_at(x, y, d).clone()),
                ],
                Component::TunnelExit(d) => vec![
                    (tun_out_name(x, y), self.tun_out_at(x, y).clone()),
                    (dir_name(x, y, d), self.dir_at(x, y, d).clone()),
                ],
            };
            for (name, literal) in pins {
                if !self.pinned.insert(name) {
                    continue;
                }
                applied += 1;
                if hard {
                    self.clauses.push(literal);
                } else {
                    self.hints.push(literal);
                }
            }
        }
        debug!(target: "model", hard, applied, "warm_start_pinned");
        Ok(())
    }
}
