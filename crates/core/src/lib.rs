//! fxrack core
//!
//! Parameter coordination for an effects rack: effect slots, their knob and
//! button parameter slots, meta parameter fan-out with soft takeover, and
//! persistence of parameter state.

pub mod domain;
