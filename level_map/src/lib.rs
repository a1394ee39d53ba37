//! Level file parsing and expansion into obstacle geometry.
#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use collision_world::{GeometryValidationConfig, ObstacleBox, ObstacleGeometry};
use engine_core::logging;
use rapier3d::math::Vector;
use rapier3d::prelude::Real;
use serde::Deserialize;

const LEVEL_VERSION: u32 = 1;
const LOG_TARGET: &str = "level";

#[derive(Clone, Debug, Deserialize)]
pub struct LevelMap {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub spawn: Option<[f32; 3]>,
    #[serde(default)]
    pub spawn_yaw_deg: Option<f32>,
    #[serde(default)]
    pub boxes: Vec<BoxSpec>,
    #[serde(default)]
    pub generators: Vec<GeneratorSpec>,
}

/// Box placed by its center and full size.
#[derive(Clone, Debug, Deserialize)]
pub struct BoxSpec {
    pub id: String,
    pub pos: [f32; 3],
    pub size: [f32; 3],
    #[serde(default)]
    pub material: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum Heading {
    #[serde(rename = "+x")]
    PosX,
    #[serde(rename = "-x")]
    NegX,
    #[serde(rename = "+z")]
    PosZ,
    #[serde(rename = "-z")]
    NegZ,
}

impl Heading {
    fn forward(self) -> [f32; 3] {
        match self {
            Heading::PosX => [1.0, 0.0, 0.0],
            Heading::NegX => [-1.0, 0.0, 0.0],
            Heading::PosZ => [0.0, 0.0, 1.0],
            Heading::NegZ => [0.0, 0.0, -1.0],
        }
    }
}

fn default_heading() -> Heading {
    Heading::PosX
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorSpec {
    Stairs {
        id: String,
        pos: [f32; 3],
        #[serde(default = "default_heading")]
        heading: Heading,
        step_count: u32,
        step_rise: f32,
        step_run: f32,
        width: f32,
        #[serde(default)]
        material: u32,
    },
    Pillars {
        id: String,
        pos: [f32; 3],
        rows: u32,
        columns: u32,
        spacing: f32,
        size: [f32; 3],
        #[serde(default)]
        material: u32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedBox {
    pub id: String,
    pub obstacle: ObstacleBox,
}

#[derive(Clone, Debug, Default)]
pub struct LevelValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LevelValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A loaded level ready for simulation.
#[derive(Clone, Debug)]
pub struct Level {
    pub name: String,
    pub spawn: Vector<Real>,
    pub spawn_yaw: Real,
    pub ids: Vec<String>,
    pub geometry: ObstacleGeometry,
}

impl LevelMap {
    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    /// Parses the plain format: a box count followed by one line per box holding
    /// the integer min corner, integer size, and material index.
    pub fn parse_plain(name: &str, text: &str) -> Result<Self, String> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.split('#').next().unwrap_or("").trim()))
            .filter(|(_, line)| !line.is_empty());
        let (count_line, count_text) = lines
            .next()
            .ok_or_else(|| "plain level is empty".to_string())?;
        let count: usize = count_text
            .parse()
            .map_err(|_| format!("line {}: expected box count, got '{}'", count_line, count_text))?;
        let budget = max_level_boxes();
        if count > budget {
            return Err(format!(
                "line {}: box count {} exceeds budget {}",
                count_line, count, budget
            ));
        }

        let mut boxes = Vec::new();
        for (line_number, line) in lines {
            if boxes.len() == count {
                return Err(format!(
                    "line {}: plain level declares {} boxes but has more lines",
                    line_number, count
                ));
            }
            let values = line
                .split_whitespace()
                .map(|token| token.parse::<i32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| format!("line {}: {}", line_number, err))?;
            if values.len() != 7 {
                return Err(format!(
                    "line {}: expected 7 integers (min xyz, size xyz, material), got {}",
                    line_number,
                    values.len()
                ));
            }
            if values[6] < 0 {
                return Err(format!("line {}: material must be >= 0", line_number));
            }
            let min = [values[0] as f32, values[1] as f32, values[2] as f32];
            let size = [values[3] as f32, values[4] as f32, values[5] as f32];
            boxes.push(BoxSpec {
                id: format!("box_{:03}", boxes.len()),
                pos: [
                    min[0] + size[0] * 0.5,
                    min[1] + size[1] * 0.5,
                    min[2] + size[2] * 0.5,
                ],
                size,
                material: values[6] as u32,
            });
        }
        if boxes.len() != count {
            return Err(format!(
                "plain level declares {} boxes but contains {}",
                count,
                boxes.len()
            ));
        }
        Ok(Self {
            version: LEVEL_VERSION,
            name: name.to_string(),
            notes: None,
            spawn: None,
            spawn_yaw_deg: None,
            boxes,
            generators: Vec::new(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            Self::parse_toml(&text)
        } else {
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("level");
            Self::parse_plain(name, &text)
        }
    }

    pub fn validate(&self) -> LevelValidation {
        let mut validation = LevelValidation::default();
        if self.version != LEVEL_VERSION {
            validation
                .errors
                .push(format!("unsupported version {}", self.version));
        }
        if self.name.trim().is_empty() {
            validation
                .errors
                .push("level name must not be empty".to_string());
        }
        if let Some(spawn) = self.spawn {
            if !vector_is_finite(spawn) {
                validation.errors.push("spawn must be finite".to_string());
            } else if spawn[1] < 0.0 {
                validation
                    .warnings
                    .push("spawn is below the ground plane".to_string());
            }
        }
        if self.boxes.is_empty() && self.generators.is_empty() {
            validation
                .warnings
                .push("level contains no boxes or generators".to_string());
        }
        for spec in &self.boxes {
            if spec.id.trim().is_empty() {
                validation.errors.push("box id must not be empty".to_string());
            }
            if !vector_is_finite(spec.pos) {
                validation
                    .errors
                    .push(format!("box '{}' has invalid pos", spec.id));
            }
            if !vector_is_finite(spec.size) || spec.size.iter().any(|value| *value <= 0.0) {
                validation
                    .errors
                    .push(format!("box '{}' has invalid size", spec.id));
            }
        }
        for generator in &self.generators {
            validate_generator(generator, &mut validation);
        }
        let budget = max_level_boxes();
        match self.box_count() {
            Some(total) if total <= budget => {}
            Some(total) => validation
                .errors
                .push(format!("level expands to {} boxes, budget is {}", total, budget)),
            None => validation
                .errors
                .push(format!("level box count overflows (budget is {})", budget)),
        }
        validation
    }

    /// Boxes after generator expansion, or `None` on overflow.
    pub fn box_count(&self) -> Option<usize> {
        self.generators
            .iter()
            .try_fold(self.boxes.len(), |total, generator| {
                total.checked_add(generator.box_count()?)
            })
    }

    pub fn expanded_boxes(&self) -> Result<Vec<ResolvedBox>, String> {
        let validation = self.validate();
        if !validation.is_ok() {
            return Err(validation.errors.join("; "));
        }
        let mut boxes: Vec<ResolvedBox> = self.boxes.iter().map(BoxSpec::resolve).collect();
        for generator in &self.generators {
            boxes.extend(generator.expand());
        }
        let mut seen = HashSet::new();
        for resolved in &boxes {
            if !seen.insert(resolved.id.as_str()) {
                return Err(format!("duplicate box id '{}'", resolved.id));
            }
        }
        Ok(boxes)
    }

    pub fn build(&self) -> Result<Level, String> {
        let validation = self.validate();
        for warning in &validation.warnings {
            logging::warn(LOG_TARGET, format!("{}: {}", self.name, warning));
        }
        let resolved = self.expanded_boxes()?;
        let ids = resolved.iter().map(|entry| entry.id.clone()).collect();
        let obstacles = resolved.iter().map(|entry| entry.obstacle).collect();
        let geometry = ObstacleGeometry::new(obstacles)?;
        let spawn = self.spawn.unwrap_or([0.0, 0.0, 0.0]);
        let spawn = Vector::new(spawn[0], spawn[1], spawn[2]);
        if let Some(index) = geometry
            .boxes()
            .iter()
            .position(|obstacle| obstacle.bounds().contains_point(spawn))
        {
            logging::warn(
                LOG_TARGET,
                format!("{}: spawn lies inside box {}", self.name, index),
            );
        }
        logging::info(
            LOG_TARGET,
            format!("loaded level '{}' ({} boxes)", self.name, geometry.len()),
        );
        Ok(Level {
            name: self.name.clone(),
            spawn,
            spawn_yaw: self.spawn_yaw_deg.unwrap_or(0.0).to_radians(),
            ids,
            geometry,
        })
    }
}

impl BoxSpec {
    fn resolve(&self) -> ResolvedBox {
        let half = [self.size[0] * 0.5, self.size[1] * 0.5, self.size[2] * 0.5];
        ResolvedBox {
            id: self.id.clone(),
            obstacle: ObstacleBox::from_center_half_extent(self.pos, half, self.material),
        }
    }
}

impl GeneratorSpec {
    fn box_count(&self) -> Option<usize> {
        match self {
            GeneratorSpec::Stairs { step_count, .. } => usize::try_from(*step_count).ok(),
            GeneratorSpec::Pillars { rows, columns, .. } => usize::try_from(*rows)
                .ok()?
                .checked_mul(usize::try_from(*columns).ok()?),
        }
    }

    fn expand(&self) -> Vec<ResolvedBox> {
        match self {
            GeneratorSpec::Stairs {
                id,
                pos,
                heading,
                step_count,
                step_rise,
                step_run,
                width,
                material,
            } => build_stairs(StairsParams {
                base_id: id,
                pos: *pos,
                heading: *heading,
                step_count: *step_count,
                step_rise: *step_rise,
                step_run: *step_run,
                width: *width,
                material: *material,
            }),
            GeneratorSpec::Pillars {
                id,
                pos,
                rows,
                columns,
                spacing,
                size,
                material,
            } => build_pillars(id, *pos, *rows, *columns, *spacing, *size, *material),
        }
    }
}

fn validate_generator(generator: &GeneratorSpec, validation: &mut LevelValidation) {
    match generator {
        GeneratorSpec::Stairs {
            id,
            step_count,
            step_rise,
            step_run,
            width,
            ..
        } => {
            if id.trim().is_empty() {
                validation
                    .errors
                    .push("stairs generator id must not be empty".to_string());
            }
            if *step_count == 0 {
                validation
                    .errors
                    .push(format!("stairs '{}' step_count must be > 0", id));
            }
            if *step_rise <= 0.0 || *step_run <= 0.0 || *width <= 0.0 {
                validation
                    .errors
                    .push(format!("stairs '{}' dimensions must be > 0", id));
            }
        }
        GeneratorSpec::Pillars {
            id,
            rows,
            columns,
            spacing,
            size,
            ..
        } => {
            if id.trim().is_empty() {
                validation
                    .errors
                    .push("pillars generator id must not be empty".to_string());
            }
            if *rows == 0 || *columns == 0 {
                validation
                    .errors
                    .push(format!("pillars '{}' needs at least one row and column", id));
            }
            if size.iter().any(|value| *value <= 0.0) {
                validation
                    .errors
                    .push(format!("pillars '{}' size must be > 0", id));
            }
            if *spacing < size[0].max(size[2]) {
                validation.warnings.push(format!(
                    "pillars '{}' spacing {} is smaller than the pillar footprint",
                    id, spacing
                ));
            }
        }
    }
}

struct StairsParams<'a> {
    base_id: &'a str,
    pos: [f32; 3],
    heading: Heading,
    step_count: u32,
    step_rise: f32,
    step_run: f32,
    width: f32,
    material: u32,
}

fn build_stairs(params: StairsParams<'_>) -> Vec<ResolvedBox> {
    let forward = params.heading.forward();
    let along_x = forward[0] != 0.0;
    (0..params.step_count)
        .map(|index| {
            let offset = params.step_run * (index as f32 + 0.5);
            let height = params.step_rise * (index as f32 + 1.0);
            let center = [
                params.pos[0] + forward[0] * offset,
                params.pos[1] + height * 0.5,
                params.pos[2] + forward[2] * offset,
            ];
            let half = if along_x {
                [params.step_run * 0.5, height * 0.5, params.width * 0.5]
            } else {
                [params.width * 0.5, height * 0.5, params.step_run * 0.5]
            };
            ResolvedBox {
                id: format!("{}/step_{:02}", params.base_id, index + 1),
                obstacle: ObstacleBox::from_center_half_extent(center, half, params.material),
            }
        })
        .collect()
}

fn build_pillars(
    base_id: &str,
    pos: [f32; 3],
    rows: u32,
    columns: u32,
    spacing: f32,
    size: [f32; 3],
    material: u32,
) -> Vec<ResolvedBox> {
    let half = [size[0] * 0.5, size[1] * 0.5, size[2] * 0.5];
    let mut boxes = Vec::new();
    for row in 0..rows {
        for column in 0..columns {
            let center = [
                pos[0] + column as f32 * spacing,
                pos[1] + half[1],
                pos[2] + row as f32 * spacing,
            ];
            boxes.push(ResolvedBox {
                id: format!("{}/r{:02}c{:02}", base_id, row + 1, column + 1),
                obstacle: ObstacleBox::from_center_half_extent(center, half, material),
            });
        }
    }
    boxes
}

fn max_level_boxes() -> usize {
    GeometryValidationConfig::default().max_boxes
}

fn vector_is_finite(value: [f32; 3]) -> bool {
    value.iter().all(|component| component.is_finite())
}
