use std::collections::HashSet;

use bracket_geometry::prelude::Point;
use bracket_random::prelude::RandomNumberGenerator;
use log::{debug, warn};
use thiserror::Error;

use crate::config::GenerationConfig;

use super::{Archetype, LevelLayout, MAX_LATTICE_SLOTS};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("lattice must be at least 1x1, got {width}x{height}")]
    InvalidLattice { width: i32, height: i32 },
    #[error("lattice of {width}x{height} has too many slots")]
    LatticeTooLarge { width: i32, height: i32 },
    #[error("start cell ({x}, {y}) lies outside the lattice")]
    StartOutOfBounds { x: i32, y: i32 },
    #[error("generic room range {min}..={max} is inverted")]
    InvertedRange { min: u32, max: u32 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeckCard {
    pub archetype: Archetype,
    pub prefab: Option<u32>,
}

/// Grows a connected room layout outward from the start cell.
#[derive(Clone, Debug)]
pub struct LevelGraphGenerator {
    config: GenerationConfig,
}

impl LevelGraphGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn generate(&self, rng: &mut RandomNumberGenerator) -> Result<LevelLayout, GenerationError> {
        self.check()?;
        let deck = self.build_deck(rng);
        Ok(self.place_cards(&deck, rng))
    }

    /// Places an explicit deck in the order given. Generic cards get
    /// sequential prefab indices.
    pub fn place_deck(
        &self,
        deck: &[Archetype],
        rng: &mut RandomNumberGenerator,
    ) -> Result<LevelLayout, GenerationError> {
        self.check()?;
        let mut next_prefab = 0;
        let cards: Vec<DeckCard> = deck
            .iter()
            .map(|&archetype| {
                let prefab = (archetype == Archetype::Generic).then(|| {
                    next_prefab += 1;
                    next_prefab - 1
                });
                DeckCard { archetype, prefab }
            })
            .collect();
        Ok(self.place_cards(&cards, rng))
    }

    /// Shop, Boss and a randomized number of generic rooms, shuffled.
    pub fn build_deck(&self, rng: &mut RandomNumberGenerator) -> Vec<DeckCard> {
        let rolled = if self.config.generic_min == self.config.generic_max {
            self.config.generic_min
        } else {
            rng.range(self.config.generic_min, self.config.generic_max + 1)
        };
        let generic_count = rolled.min(self.config.prefab_pool);
        if generic_count < rolled {
            warn!(
                "prefab pool of {} caps generic rooms below the rolled {}",
                self.config.prefab_pool, rolled
            );
        }

        let mut prefabs: Vec<u32> = (0..self.config.prefab_pool).collect();
        shuffle(&mut prefabs, rng);

        let mut deck = vec![
            DeckCard {
                archetype: Archetype::Shop,
                prefab: None,
            },
            DeckCard {
                archetype: Archetype::Boss,
                prefab: None,
            },
        ];
        deck.extend(
            prefabs
                .into_iter()
                .take(generic_count as usize)
                .map(|prefab| DeckCard {
                    archetype: Archetype::Generic,
                    prefab: Some(prefab),
                }),
        );
        shuffle(&mut deck, rng);
        deck
    }

    fn check(&self) -> Result<(), GenerationError> {
        let GenerationConfig {
            lattice_width: width,
            lattice_height: height,
            start_x,
            start_y,
            generic_min,
            generic_max,
            ..
        } = self.config;
        if width <= 0 || height <= 0 {
            return Err(GenerationError::InvalidLattice { width, height });
        }
        if width.checked_mul(height).is_none_or(|slots| slots > MAX_LATTICE_SLOTS) {
            return Err(GenerationError::LatticeTooLarge { width, height });
        }
        if start_x < 0 || start_x >= width || start_y < 0 || start_y >= height {
            return Err(GenerationError::StartOutOfBounds {
                x: start_x,
                y: start_y,
            });
        }
        if generic_min > generic_max {
            return Err(GenerationError::InvertedRange {
                min: generic_min,
                max: generic_max,
            });
        }
        Ok(())
    }

    fn place_cards(&self, deck: &[DeckCard], rng: &mut RandomNumberGenerator) -> LevelLayout {
        let start = Point::new(self.config.start_x, self.config.start_y);
        let mut layout =
            LevelLayout::with_start(self.config.lattice_width, self.config.lattice_height, start);
        let mut frontier = Frontier::default();
        frontier.expand(&layout, start);

        for (placed, card) in deck.iter().enumerate() {
            let Some(cell) = frontier.take_random(rng) else {
                warn!(
                    "frontier exhausted after {placed} of {} rooms; {} archetypes left unplaced",
                    deck.len(),
                    deck.len() - placed
                );
                break;
            };
            if layout.place(cell, card.archetype, card.prefab).is_some() {
                debug!(
                    "placed {} room at ({}, {})",
                    card.archetype.as_str(),
                    cell.x,
                    cell.y
                );
                frontier.expand(&layout, cell);
            }
        }

        layout
    }
}

/// Vacant lattice cells adjacent to an occupied cell. Kept as a `Vec` for
/// uniform indexed picks and a set for deduplication.
#[derive(Default)]
struct Frontier {
    cells: Vec<Point>,
    members: HashSet<Point>,
}

impl Frontier {
    fn expand(&mut self, layout: &LevelLayout, around: Point) {
        for neighbor in layout.lattice_neighbors(around) {
            if !layout.is_occupied(neighbor) && self.members.insert(neighbor) {
                self.cells.push(neighbor);
            }
        }
    }

    fn take_random(&mut self, rng: &mut RandomNumberGenerator) -> Option<Point> {
        if self.cells.is_empty() {
            return None;
        }
        let idx = rng.range(0, self.cells.len() as i32) as usize;
        let cell = self.cells.swap_remove(idx);
        self.members.remove(&cell);
        Some(cell)
    }
}

pub(crate) fn shuffle<T>(items: &mut [T], rng: &mut RandomNumberGenerator) {
    for i in (1..items.len()).rev() {
        let j = rng.range(0, i as i32 + 1) as usize;
        items.swap(i, j);
    }
}
