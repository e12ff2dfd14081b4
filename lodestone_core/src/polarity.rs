//! Tri-state pole classification and its sign convention.

use serde::{Deserialize, Serialize};

/// Pole type of a monopole or a gaussmeter reading.
///
/// The sign is used directly as the charge multiplier:
/// North → +1, South → −1, None → 0. The same integer travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Polarity {
    #[default]
    None,
    North,
    South,
}

impl Polarity {
    /// Charge multiplier for this pole.
    pub fn sign(self) -> i32 {
        match self {
            Polarity::None => 0,
            Polarity::North => 1,
            Polarity::South => -1,
        }
    }
    
    /// Returns true for North or South.
    pub fn is_magnetized(self) -> bool {
        self != Polarity::None
    }
    
    /// Integer sent in a replication message.
    pub fn to_wire(self) -> i32 {
        self.sign()
    }
    
    /// Decodes a replicated integer; anything out of range becomes `None`.
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => Polarity::North,
            -1 => Polarity::South,
            _ => Polarity::None,
        }
    }
    
    /// Maps a pole-type menu index (0 = North, 1 = South).
    pub fn from_menu_index(index: usize) -> Self {
        match index {
            0 => Polarity::North,
            1 => Polarity::South,
            _ => Polarity::None,
        }
    }
    
    /// Flips between `self` and `None`: pressing an active pole clears it.
    pub fn toggled(current: Polarity, pole: Polarity) -> Polarity {
        if current == pole {
            Polarity::None
        } else {
            pole
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Polarity::None => "None",
            Polarity::North => "North",
            Polarity::South => "South",
        };
        write!(f, "{}", name)
    }
}
