use alloc::boxed::Box;

use embedded_hal::digital::OutputPin;

/// Something that shows disk activity.
pub trait ActivityLed: Send {
    fn set(&mut self, on: bool);
}

/// An activity LED on a GPIO pin. `inverted` selects active-low wiring.
pub struct PinLed<P> {
    pin: P,
    inverted: bool,
}

impl<P: OutputPin> PinLed<P> {
    pub fn new(mut pin: P, inverted: bool) -> Self {
        let _ = if inverted { pin.set_high() } else { pin.set_low() };
        Self { pin, inverted }
    }

    pub fn boxed(pin: P, inverted: bool) -> Box<dyn ActivityLed>
    where
        P: Send + 'static,
    {
        Box::new(Self::new(pin, inverted))
    }
}

impl<P: OutputPin + Send> ActivityLed for PinLed<P> {
    fn set(&mut self, on: bool) {
        // GPIO writes on this part cannot fail
        let _ = if on != self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

/// Optional LED slot shared by both drivers.
#[derive(Default)]
pub struct Activity {
    led: Option<Box<dyn ActivityLed>>,
}

impl Activity {
    pub fn new(led: Option<Box<dyn ActivityLed>>) -> Self {
        Self { led }
    }

    pub fn set(&mut self, on: bool) {
        if let Some(led) = self.led.as_mut() {
            led.set(on);
        }
    }
}

impl core::fmt::Debug for Activity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Activity {{ led: {} }}", self.led.is_some())
    }
}
