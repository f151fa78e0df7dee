//! Background Tasks Module
//!
//! # Tasks
//! - Reaper: sleeps until the earliest cache deadline and evicts expired items

mod reaper;

pub(crate) use reaper::{spawn_reaper, ReaperHandle};
