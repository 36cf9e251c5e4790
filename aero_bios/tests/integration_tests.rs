//! BIOS integration tests.
//!
//! Drives [`aero_bios::BiosContext`] through boot, injected faults and the
//! periodic supervisor the way the runtime does.

mod integration;
