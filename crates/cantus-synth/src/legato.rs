//! Legato retrigger policy for monophonic play.

use serde::{Deserialize, Serialize};

use crate::voice::{ReleaseKind, RetriggerKind};
use crate::{Error, Result};

/// How a legato transition treats the sounding voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LegatoMode {
    /// Release the previous note quickly and start a new voice
    RetriggerFast,
    /// Release the previous note normally and start a new voice
    RetriggerNormal,
    /// Re-attack the sounding voice from its current level
    #[default]
    MultiRetrigger,
    /// Keep the sounding voice, change pitch and reshape the current
    /// envelope section with the new dynamics
    SingleTriggerShapeAdsr,
    /// Keep the sounding voice, change pitch only
    SingleTriggerNoAdsr,
}

/// What to do with the voices of the previous note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegatoAction {
    /// Release them and start fresh voices for the new note.
    Restart(ReleaseKind),
    /// Hand them over to the new note.
    Retrigger(RetriggerKind),
}

impl LegatoMode {
    /// Action taken on a legato transition.
    #[inline]
    pub fn action(self) -> LegatoAction {
        match self {
            LegatoMode::RetriggerFast => LegatoAction::Restart(ReleaseKind::Fast),
            LegatoMode::RetriggerNormal => LegatoAction::Restart(ReleaseKind::Normal),
            LegatoMode::MultiRetrigger => LegatoAction::Retrigger(RetriggerKind::MultiRetrigger),
            LegatoMode::SingleTriggerShapeAdsr => {
                LegatoAction::Retrigger(RetriggerKind::ShapeCurrentSection)
            }
            LegatoMode::SingleTriggerNoAdsr => LegatoAction::Retrigger(RetriggerKind::PitchOnly),
        }
    }
}

impl TryFrom<u8> for LegatoMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(LegatoMode::RetriggerFast),
            1 => Ok(LegatoMode::RetriggerNormal),
            2 => Ok(LegatoMode::MultiRetrigger),
            3 => Ok(LegatoMode::SingleTriggerShapeAdsr),
            4 => Ok(LegatoMode::SingleTriggerNoAdsr),
            other => Err(Error::invalid(format!("legato mode {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions() {
        assert_eq!(
            LegatoMode::RetriggerNormal.action(),
            LegatoAction::Restart(ReleaseKind::Normal)
        );
        assert_eq!(
            LegatoMode::SingleTriggerNoAdsr.action(),
            LegatoAction::Retrigger(RetriggerKind::PitchOnly)
        );
        assert_eq!(LegatoMode::default(), LegatoMode::MultiRetrigger);
    }

    #[test]
    fn test_numbering() {
        assert_eq!(LegatoMode::try_from(3), Ok(LegatoMode::SingleTriggerShapeAdsr));
        assert!(LegatoMode::try_from(5).is_err());
    }
}
