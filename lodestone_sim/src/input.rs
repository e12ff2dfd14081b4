//! Scripted keyboard input for scenarios.

use lodestone_env::ControlInput;
use std::collections::HashSet;

/// One control held over a tick range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHold {
    pub control: String,
    
    /// First tick the control is down
    pub from_tick: u64,
    
    /// First tick the control is up again
    pub until_tick: u64,
}

/// Per-tick key script.
///
/// `advance(tick)` recomputes which controls are down and which went down
/// this tick (rising edges), the way a real keyboard poll would.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: Vec<KeyHold>,
    held: HashSet<String>,
    pressed: HashSet<String>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Holds `control` for ticks `from..until`.
    pub fn hold(mut self, control: &str, from_tick: u64, until_tick: u64) -> Self {
        self.script.push(KeyHold {
            control: control.to_string(),
            from_tick,
            until_tick,
        });
        self
    }
    
    /// Holds `control` for exactly one tick.
    pub fn tap(self, control: &str, tick: u64) -> Self {
        self.hold(control, tick, tick + 1)
    }
    
    /// Moves the script to `tick`.
    pub fn advance(&mut self, tick: u64) {
        let held: HashSet<String> = self
            .script
            .iter()
            .filter(|k| (k.from_tick..k.until_tick).contains(&tick))
            .map(|k| k.control.clone())
            .collect();
        self.pressed = held.difference(&self.held).cloned().collect();
        self.held = held;
    }
    
    pub fn script(&self) -> &[KeyHold] {
        &self.script
    }
}

impl ControlInput for ScriptedInput {
    fn is_held(&self, control: &str) -> bool {
        self.held.contains(control)
    }
    
    fn is_pressed(&self, control: &str) -> bool {
        self.pressed.contains(control)
    }
    
    fn emulation_held(&self, _control: &str) -> bool {
        false
    }
    
    fn emulation_pressed(&self, _control: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_hold_reports_edge_once() {
        let mut input = ScriptedInput::new().hold("n", 3, 6);
        
        input.advance(2);
        assert!(!input.is_held("n"));
        
        input.advance(3);
        assert!(input.is_held("n"));
        assert!(input.is_pressed("n"));
        
        input.advance(4);
        assert!(input.is_held("n"));
        assert!(!input.is_pressed("n"));
        
        input.advance(6);
        assert!(!input.is_held("n"));
    }
    
    #[test]
    fn test_back_to_back_taps_have_no_second_edge() {
        let mut input = ScriptedInput::new().tap("s", 1).tap("s", 2).tap("s", 4);
        
        input.advance(1);
        assert!(input.is_pressed("s"));
        input.advance(2);
        assert!(!input.is_pressed("s"));
        input.advance(3);
        input.advance(4);
        assert!(input.is_pressed("s"));
    }
}
