//! Connection indicator.
//!
//! The LED is lit while a session is `Active`. The panel task reports state
//! changes through [`LedObserver`]; the LED task only waits on the signal.

use defmt::debug;
use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use relay_panel::{SessionEvent, SessionObserver, SessionState};

pub type LinkSignal = Signal<CriticalSectionRawMutex, bool>;

/// Forwards session state to the LED task.
pub struct LedObserver {
    signal: &'static LinkSignal,
}

impl LedObserver {
    pub fn new(signal: &'static LinkSignal) -> Self {
        Self { signal }
    }
}

impl SessionObserver for LedObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        if let SessionEvent::StateChanged(state) = event {
            self.signal.signal(*state == SessionState::Active);
        }
    }
}

/// Drive the (active-low) LED from the link signal.
pub async fn led_loop(pin: AnyPin, signal: &'static LinkSignal) -> ! {
    let mut led = Output::new(pin, Level::High, OutputDrive::Standard);

    loop {
        let active = signal.wait().await;
        debug!("Status LED: {}", active);
        if active {
            led.set_low();
        } else {
            led.set_high();
        }
    }
}
