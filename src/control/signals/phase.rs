//! Light strings and the phase-compatibility matrix

use anyhow::{anyhow, Result};
use std::fmt;

/// Light shown to one link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Light {
    Red,
    Amber,
    /// Green without priority ('g')
    Green,
    /// Green with priority ('G')
    PriorityGreen,
}

impl Light {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(Light::Red),
            'y' => Some(Light::Amber),
            'g' => Some(Light::Green),
            'G' => Some(Light::PriorityGreen),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Light::Red => 'r',
            Light::Amber => 'y',
            Light::Green => 'g',
            Light::PriorityGreen => 'G',
        }
    }

    pub fn is_green(self) -> bool {
        matches!(self, Light::Green | Light::PriorityGreen)
    }
}

/// Lights of every link of a junction, indexed by link index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseString(Vec<Light>);

impl PhaseString {
    pub fn parse(text: &str) -> Result<Self> {
        text.chars()
            .map(|c| Light::from_char(c).ok_or_else(|| anyhow!("Unknown light {:?} in {:?}", c, text)))
            .collect::<Result<Vec<_>>>()
            .map(PhaseString)
    }

    /// Keeps the greens of an engine light string and turns everything else red
    pub fn green_part(text: &str) -> Self {
        PhaseString(
            text.chars()
                .map(|c| match Light::from_char(c) {
                    Some(light) if light.is_green() => light,
                    _ => Light::Red,
                })
                .collect(),
        )
    }

    pub fn all_red(links: usize) -> Self {
        PhaseString(vec![Light::Red; links])
    }

    pub fn lights(&self) -> &[Light] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_green(&self) -> bool {
        self.0.iter().any(|light| light.is_green())
    }

    /// Intermediate lights when switching from `self` to `next`.
    ///
    /// Links green in both phases stay green as they were, links losing
    /// their green turn amber and everything else is red.
    pub fn amber_towards(&self, next: &PhaseString) -> PhaseString {
        PhaseString(
            self.0
                .iter()
                .zip(&next.0)
                .map(|(old, new)| match (old.is_green(), new.is_green()) {
                    (true, true) => *old,
                    (true, false) => Light::Amber,
                    (false, _) => Light::Red,
                })
                .collect(),
        )
    }
}

impl fmt::Display for PhaseString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for light in &self.0 {
            write!(f, "{}", light.to_char())?;
        }
        Ok(())
    }
}

/// Extracts the distinct green phases of a signal program, in program order
pub fn green_phases(program: &[String]) -> Vec<PhaseString> {
    let mut phases: Vec<PhaseString> = Vec::new();
    for text in program {
        let phase = PhaseString::green_part(text);
        if phase.has_green() && !phases.contains(&phase) {
            phases.push(phase);
        }
    }
    phases
}

/// The matrix `L`: for each phase, the weight of every link index.
///
/// A positive weight means the link is green in that phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseMatrix {
    rows: Vec<Vec<f64>>,
}

impl PhaseMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Builds `L` from phase strings. Give-way links ('g') weigh
    /// `give_way_weight` when given, 1 otherwise.
    pub fn from_phases(phases: &[PhaseString], give_way_weight: Option<f64>) -> Self {
        let rows = phases
            .iter()
            .map(|phase| {
                phase
                    .lights()
                    .iter()
                    .map(|light| match light {
                        Light::PriorityGreen => 1.0,
                        Light::Green => give_way_weight.unwrap_or(1.0),
                        Light::Red | Light::Amber => 0.0,
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn phase_count(&self) -> usize {
        self.rows.len()
    }

    pub fn link_count(&self) -> usize {
        self.rows.first().map(|row| row.len()).unwrap_or(0)
    }

    pub fn row(&self, phase: usize) -> &[f64] {
        &self.rows[phase]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn weight(&self, phase: usize, link: usize) -> f64 {
        self.rows[phase][link]
    }

    pub fn is_open(&self, phase: usize, link: usize) -> bool {
        self.rows[phase][link] > 0.0
    }

    /// Link indices green in a phase
    pub fn open_links(&self, phase: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[phase]
            .iter()
            .enumerate()
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(link, _)| link)
    }

    /// A phase is feasible when it opens at least one link
    pub fn is_feasible(&self, phase: usize) -> bool {
        self.rows[phase].iter().any(|weight| *weight > 0.0)
    }

    pub fn first_feasible(&self) -> Option<usize> {
        (0..self.rows.len()).find(|phase| self.is_feasible(*phase))
    }

    /// Weighted sum of per-link values over one phase
    pub fn dot(&self, phase: usize, values: &[f64]) -> f64 {
        self.rows[phase]
            .iter()
            .zip(values)
            .map(|(weight, value)| weight * value)
            .sum()
    }

    /// Weighted sums for every phase
    pub fn dot_all(&self, values: &[f64]) -> Vec<f64> {
        (0..self.rows.len()).map(|phase| self.dot(phase, values)).collect()
    }

    /// Copy with every column where `keep` is false set to 0
    pub fn mask_links(&self, keep: impl Fn(usize) -> bool) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(link, weight)| if keep(link) { *weight } else { 0.0 })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Copy with every phase that does not open `link` set to all 0
    pub fn only_phases_opening(&self, link: usize) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                if row.get(link).is_some_and(|weight| *weight > 0.0) {
                    row.clone()
                } else {
                    vec![0.0; row.len()]
                }
            })
            .collect();
        Self { rows }
    }
}
