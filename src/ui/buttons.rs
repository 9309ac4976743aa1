//! GPIO button input with async debouncing.
//!
//! Four physical buttons (active-low with internal pull-up), one per relay.
//! Each press toggles its relay on the connected board.
//!
//! Each button is handled by an async task that waits for a GPIO edge,
//! debounces it, and sends a `PanelCommand` to the panel task.

use crate::ui::CommandSender;
use defmt::info;
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_time::{Duration, Timer};
use relay_panel::config::BUTTON_DEBOUNCE_MS;
use relay_panel::{PanelCommand, Relay};

/// Run a single button polling loop.
///
/// Waits for the pin to go low (pressed), debounces, sends the toggle,
/// then waits for release before repeating.
pub async fn button_loop(pin: AnyPin, relay: Relay, tx: CommandSender) -> ! {
    let mut btn = Input::new(pin, Pull::Up);

    loop {
        btn.wait_for_falling_edge().await;

        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;

        if btn.is_low() {
            info!("Button: relay {}", relay.number());
            tx.send(PanelCommand::ToggleRelay(relay)).await;

            // Wait for release to avoid repeat triggers.
            btn.wait_for_rising_edge().await;
            Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        }
    }
}
