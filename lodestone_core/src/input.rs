//! Control sampling and block-to-block key emulation.

use lodestone_env::ControlInput;
use std::collections::{HashMap, HashSet};

/// Held / pressed state of one control, physical OR emulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlSample {
    /// Down this frame
    pub held: bool,
    
    /// Went down this frame (rising edge)
    pub pressed: bool,
}

impl ControlSample {
    /// A control that is held but was not newly pressed.
    pub const HELD: ControlSample = ControlSample { held: true, pressed: false };
    
    /// A control on its rising edge.
    pub const PRESSED: ControlSample = ControlSample { held: true, pressed: true };
    
    /// Reads `control` from `input`; a missing control reads as released.
    pub fn read<I: ControlInput + ?Sized>(input: &I, control: Option<&str>) -> Self {
        match control {
            Some(name) => Self {
                held: input.is_held(name) || input.emulation_held(name),
                pressed: input.is_pressed(name) || input.emulation_pressed(name),
            },
            None => Self::default(),
        }
    }
}

/// Emulated key states written by sensors and read by every block.
///
/// Writes are staged and become visible on the next `advance`, so a
/// gaussmeter classifying in tick N drives electromagnets in tick N+1.
#[derive(Debug, Default)]
pub struct EmulationBus {
    held: HashSet<String>,
    pressed: HashSet<String>,
    staged: HashMap<String, bool>,
}

impl EmulationBus {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Stages the emulated held state of `control` for the next frame.
    pub fn emulate(&mut self, control: &str, held: bool) {
        self.staged.insert(control.to_string(), held);
    }
    
    /// Publishes staged writes and recomputes rising edges.
    pub fn advance(&mut self) {
        self.pressed.clear();
        for (control, held) in self.staged.drain() {
            if held {
                if self.held.insert(control.clone()) {
                    self.pressed.insert(control);
                }
            } else {
                self.held.remove(&control);
            }
        }
    }
    
    pub fn is_held(&self, control: &str) -> bool {
        self.held.contains(control)
    }
    
    pub fn is_pressed(&self, control: &str) -> bool {
        self.pressed.contains(control)
    }
}

/// Physical input with the session's emulation bus layered on top.
pub struct LayeredInput<'a, I: ControlInput + ?Sized> {
    keys: &'a I,
    bus: &'a EmulationBus,
}

impl<'a, I: ControlInput + ?Sized> LayeredInput<'a, I> {
    pub fn new(keys: &'a I, bus: &'a EmulationBus) -> Self {
        Self { keys, bus }
    }
}

impl<I: ControlInput + ?Sized> ControlInput for LayeredInput<'_, I> {
    fn is_held(&self, control: &str) -> bool {
        self.keys.is_held(control)
    }
    
    fn is_pressed(&self, control: &str) -> bool {
        self.keys.is_pressed(control)
    }
    
    fn emulation_held(&self, control: &str) -> bool {
        self.keys.emulation_held(control) || self.bus.is_held(control)
    }
    
    fn emulation_pressed(&self, control: &str) -> bool {
        self.keys.emulation_pressed(control) || self.bus.is_pressed(control)
    }
}
