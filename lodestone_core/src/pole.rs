//! Pole state machines.
//!
//! Every magnetic block carries one `PoleSource`, chosen once from its
//! configuration:
//!
//! - no activation controls → `Natural` (menu-selected, always active)
//! - a north and/or south control → `DualKey` electromagnet
//! - a single activation control → `SingleKey` electromagnet (legacy)
//!
//! Transitions are pure: `next(state, inputs)` returns the new state and
//! the owning entity stores it.

use crate::input::ControlSample;
use crate::polarity::Polarity;
use lodestone_env::ControlInput;
use serde::{Deserialize, Serialize};

/// How an electromagnet reacts to its controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationMode {
    /// Magnetized only while the control is held
    Hold,
    
    /// Each press flips the state
    Toggle,
}

impl ActivationMode {
    /// Maps the "hold to magnetize" toggle.
    pub fn from_hold_flag(hold_to_magnetize: bool) -> Self {
        if hold_to_magnetize {
            ActivationMode::Hold
        } else {
            ActivationMode::Toggle
        }
    }
}

/// Where a block's polarity comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoleSource {
    /// Permanent magnet; polarity only changes through the menu.
    Natural,
    
    /// Electromagnet with separate north and south controls.
    DualKey {
        north: Option<String>,
        south: Option<String>,
        mode: ActivationMode,
    },
    
    /// Electromagnet with one on/off control and a fixed polarity.
    SingleKey {
        control: String,
        mode: ActivationMode,
    },
}

/// Polarity plus activation flag of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoleState {
    pub polarity: Polarity,
    pub activated: bool,
}

impl PoleState {
    /// Polarity that actually contributes charge.
    pub fn effective(&self) -> Polarity {
        if self.activated {
            self.polarity
        } else {
            Polarity::None
        }
    }
}

/// Control samples consumed by one transition.
///
/// For `SingleKey` the activation control is sampled into `north`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoleInputs {
    pub north: ControlSample,
    pub south: ControlSample,
}

impl PoleSource {
    /// Selects the variant from which controls are configured.
    pub fn select(
        north: Option<&str>,
        south: Option<&str>,
        activation: Option<&str>,
        hold_to_magnetize: bool,
    ) -> Self {
        let mode = ActivationMode::from_hold_flag(hold_to_magnetize);
        if north.is_some() || south.is_some() {
            PoleSource::DualKey {
                north: north.map(str::to_string),
                south: south.map(str::to_string),
                mode,
            }
        } else if let Some(control) = activation {
            PoleSource::SingleKey {
                control: control.to_string(),
                mode,
            }
        } else {
            PoleSource::Natural
        }
    }
    
    pub fn is_electromagnet(&self) -> bool {
        !matches!(self, PoleSource::Natural)
    }
    
    /// State a freshly built block starts in.
    ///
    /// Electromagnets start off; the menu polarity only matters for
    /// `Natural` and `SingleKey`.
    pub fn initial_state(&self, menu_polarity: Polarity) -> PoleState {
        match self {
            PoleSource::Natural => PoleState {
                polarity: menu_polarity,
                activated: true,
            },
            PoleSource::DualKey { .. } => PoleState {
                polarity: Polarity::None,
                activated: true,
            },
            PoleSource::SingleKey { .. } => PoleState {
                polarity: menu_polarity,
                activated: false,
            },
        }
    }
    
    /// Samples this source's controls.
    pub fn sample<I: ControlInput + ?Sized>(&self, input: &I) -> PoleInputs {
        match self {
            PoleSource::Natural => PoleInputs::default(),
            PoleSource::DualKey { north, south, .. } => PoleInputs {
                north: ControlSample::read(input, north.as_deref()),
                south: ControlSample::read(input, south.as_deref()),
            },
            PoleSource::SingleKey { control, .. } => PoleInputs {
                north: ControlSample::read(input, Some(control)),
                south: ControlSample::default(),
            },
        }
    }
    
    /// Computes the next state.
    pub fn next(&self, state: PoleState, inputs: PoleInputs) -> PoleState {
        match self {
            PoleSource::Natural => state,
            
            PoleSource::DualKey { mode: ActivationMode::Hold, .. } => {
                let polarity = match (inputs.north.held, inputs.south.held) {
                    (true, true) => Polarity::None,
                    (true, false) => Polarity::North,
                    (false, true) => Polarity::South,
                    (false, false) => Polarity::None,
                };
                PoleState { polarity, ..state }
            }
            
            PoleSource::DualKey { mode: ActivationMode::Toggle, .. } => {
                let polarity = if inputs.north.pressed {
                    Polarity::toggled(state.polarity, Polarity::North)
                } else if inputs.south.pressed {
                    Polarity::toggled(state.polarity, Polarity::South)
                } else {
                    state.polarity
                };
                PoleState { polarity, ..state }
            }
            
            PoleSource::SingleKey { mode: ActivationMode::Hold, .. } => PoleState {
                activated: inputs.north.held,
                ..state
            },
            
            PoleSource::SingleKey { mode: ActivationMode::Toggle, .. } => PoleState {
                activated: state.activated ^ inputs.north.pressed,
                ..state
            },
        }
    }
}
