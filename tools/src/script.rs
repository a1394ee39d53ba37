use std::fs;
use std::path::Path;

use player_controller::RawInput;
use rapier3d::prelude::Real;
use serde::Deserialize;

/// Scripted device input: segments play back to back, each holding its
/// buttons for `ticks` frames.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputScript {
    #[serde(default)]
    pub segments: Vec<ScriptSegment>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptSegment {
    pub ticks: u32,
    #[serde(rename = "move")]
    pub move_axis: [Real; 2],
    pub look: [Real; 2],
    pub jump: bool,
    pub primary: bool,
    pub secondary: bool,
    pub boost: bool,
}

impl ScriptSegment {
    fn raw(&self) -> RawInput {
        RawInput {
            move_x: self.move_axis[0],
            move_y: self.move_axis[1],
            look_delta: self.look,
            jump: self.jump,
            primary: self.primary,
            secondary: self.secondary,
            boost: self.boost,
        }
    }
}

impl InputScript {
    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        Self::parse_toml(&text).map_err(|err| format!("{}: {}", path.display(), err))
    }

    pub fn total_ticks(&self) -> u64 {
        self.segments.iter().map(|segment| u64::from(segment.ticks)).sum()
    }

    /// Held input for `tick`; idle once the script has run out.
    pub fn raw_at(&self, tick: u64) -> RawInput {
        let mut start = 0u64;
        for segment in &self.segments {
            let end = start + u64::from(segment.ticks);
            if tick < end {
                return segment.raw();
            }
            start = end;
        }
        RawInput::default()
    }
}
