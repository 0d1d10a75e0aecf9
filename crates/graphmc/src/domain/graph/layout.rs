//! Static memory layout: the globals a source declares.

use crate::domain::event::{Address, Location, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A global location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    /// First byte
    pub addr: Address,
    /// Width in bytes
    pub size: u8,
    /// Initial value
    pub init: Value,
    /// Survives a crash in persistency mode
    pub persistent: bool,
}

impl Global {
    /// Location covering the whole global
    pub const fn location(&self) -> Location {
        Location::new(self.addr, self.size)
    }

    /// Whether `loc` lies entirely inside this global
    pub const fn covers(&self, loc: &Location) -> bool {
        loc.addr.0 >= self.addr.0 && loc.addr.0 + loc.size as u64 <= self.addr.0 + self.size as u64
    }
}

/// Where an access lands relative to the declared globals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    /// Entirely inside one global
    Inside(&'a Global),
    /// Overlaps a global but runs past it
    Straddles(&'a Global),
    /// Touches no global
    Outside,
}

/// Globals indexed by address
#[derive(Debug, Clone, Default)]
pub struct MemoryLayout {
    globals: BTreeMap<Address, Global>,
}

impl MemoryLayout {
    /// Build a layout from declarations; later duplicates win
    pub fn new(globals: impl IntoIterator<Item = Global>) -> Self {
        Self {
            globals: globals.into_iter().map(|g| (g.addr, g)).collect(),
        }
    }

    /// Classify an access against the globals
    pub fn place(&self, loc: &Location) -> Placement<'_> {
        let candidate = self.globals.range(..=loc.addr).next_back().map(|(_, g)| g);
        if let Some(g) = candidate {
            if g.covers(loc) {
                return Placement::Inside(g);
            }
            if g.location().overlaps(loc) {
                return Placement::Straddles(g);
            }
        }
        self.globals
            .values()
            .find(|g| g.location().overlaps(loc))
            .map_or(Placement::Outside, Placement::Straddles)
    }

    /// Initial value of a global starting at `addr`
    pub fn init_value(&self, addr: Address) -> Option<Value> {
        match self.place(&Location::new(addr, 1)) {
            Placement::Inside(g) if g.addr == addr => Some(g.init),
            _ => None,
        }
    }

    /// Persistent globals in address order
    pub fn persistent(&self) -> impl Iterator<Item = &Global> {
        self.globals.values().filter(|g| g.persistent)
    }

    /// All globals in address order
    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.globals.values()
    }

    /// Copy of the layout with the given initial values replaced
    pub fn with_inits(&self, inits: &[(Address, Value)]) -> Self {
        let mut layout = self.clone();
        for (addr, value) in inits {
            if let Some(g) = layout.globals.get_mut(addr) {
                g.init = *value;
            }
        }
        layout
    }
}
