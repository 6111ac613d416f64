//! Orchestrator state and the user-facing prompts.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarBotState {
    Connecting,
    Searching,
    Startup,
    Idle,
    Mixing,
    Cleaning,
    CleaningCycle,
    SingleIngredient,
    Crushing,
    Straw,
}

impl BarBotState {
    /// States that run one action and then return to idle.
    pub const fn is_action(self) -> bool {
        !matches!(
            self,
            BarBotState::Connecting
                | BarBotState::Searching
                | BarBotState::Startup
                | BarBotState::Idle
        )
    }
}

impl fmt::Display for BarBotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BarBotState::Connecting => "CONNECTING",
            BarBotState::Searching => "SEARCHING",
            BarBotState::Startup => "STARTUP",
            BarBotState::Idle => "IDLE",
            BarBotState::Mixing => "MIXING",
            BarBotState::Cleaning => "CLEANING",
            BarBotState::CleaningCycle => "CLEANING_CYCLE",
            BarBotState::SingleIngredient => "SINGLE_INGREDIENT",
            BarBotState::Crushing => "CRUSHING",
            BarBotState::Straw => "STRAW",
        };
        f.write_str(s)
    }
}

/// The user's answer to the prompt currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserInput {
    #[default]
    Undefined,
    Yes,
    No,
}

/// Buttons a prompt needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Responses {
    None,
    Acknowledge,
    YesNo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserMessageType {
    #[default]
    None,
    MixingDoneRemoveGlas,
    PlaceGlas,
    IngredientEmpty,
    AskForStraw,
    StrawsEmpty,
    CleaningAdapter,
    AskForIce,
    IceEmpty,
    I2cError,
    UnknownError,
    GlasRemovedWhileDrafting,
    CrusherCoverOpen,
    CrusherTimeout,
    BoardNotConnectedBalance,
    BoardNotConnectedMixer,
    BoardNotConnectedStraw,
    BoardNotConnectedCrusher,
    BoardNotConnectedSugar,
}

impl UserMessageType {
    pub const fn responses(self) -> Responses {
        use UserMessageType::*;
        match self {
            None | MixingDoneRemoveGlas | BoardNotConnectedBalance => Responses::None,
            PlaceGlas | I2cError | UnknownError | GlasRemovedWhileDrafting
            | BoardNotConnectedMixer | BoardNotConnectedStraw | BoardNotConnectedCrusher
            | BoardNotConnectedSugar => Responses::Acknowledge,
            IngredientEmpty | AskForStraw | StrawsEmpty | CleaningAdapter | AskForIce
            | IceEmpty | CrusherCoverOpen | CrusherTimeout => Responses::YesNo,
        }
    }

    /// Short operator-facing text.
    pub const fn text(self) -> &'static str {
        use UserMessageType::*;
        match self {
            None => "",
            MixingDoneRemoveGlas => "Your drink is ready, please remove the glass",
            PlaceGlas => "Please place a glass on the platform",
            IngredientEmpty => "The ingredient is empty. Refill it and continue?",
            AskForStraw => "Add a straw?",
            StrawsEmpty => "Out of straws. Refill and try again?",
            CleaningAdapter => "Is the cleaning adapter attached?",
            AskForIce => "Add ice?",
            IceEmpty => "Out of ice. Refill and continue?",
            I2cError => "Internal board communication failed",
            UnknownError => "Unexpected mainboard error",
            GlasRemovedWhileDrafting => "The glass was removed while drafting",
            CrusherCoverOpen => "The ice crusher cover is open. Close it and continue?",
            CrusherTimeout => "The ice crusher timed out. Try again?",
            BoardNotConnectedBalance => "The balance board is not connected",
            BoardNotConnectedMixer => "The mixer board is not connected",
            BoardNotConnectedStraw => "The straw dispenser is not connected",
            BoardNotConnectedCrusher => "The ice crusher is not connected",
            BoardNotConnectedSugar => "The sugar dispenser is not connected",
        }
    }
}
