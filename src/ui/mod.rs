//! Physical controls - relay buttons and the connection LED.
//!
//! ## Components
//!
//! - **Buttons**: 4 tactile switches with debouncing, one per relay
//! - **Status LED**: lit while a relay board session is active

pub mod buttons;
pub mod status_led;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use relay_panel::PanelCommand;

/// Depth of the command queue into the panel task.
pub const COMMAND_QUEUE_LEN: usize = 4;

pub type CommandSender = Sender<'static, CriticalSectionRawMutex, PanelCommand, COMMAND_QUEUE_LEN>;
