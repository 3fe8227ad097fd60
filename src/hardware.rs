//! Door sensor and indicator pins over sysfs GPIO.
//!
//! All pin access goes through one [`SysfsGpio`] handle whose bus lock
//! serializes every read and write, no matter which task asks. The
//! sensor and panel types wrap that handle behind small traits so the
//! reconciler and command responder can be tested without hardware.

use crate::config::{IndicatorConfig, SensorConfig};
use crate::error::{Result, StatusError};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Reads the door switch. High means the lab is open.
pub trait DoorSensor: Send + Sync {
    fn read_open(&self) -> Result<bool>;
}

/// Drives the status and entrance indicator pins.
pub trait IndicatorPanel: Send + Sync {
    fn set_pin(&self, pin: u8, high: bool) -> Result<()>;
}

/// Raw sysfs GPIO access rooted at a base directory.
///
/// Accesses are sub-millisecond file reads, cheap enough to issue from
/// async context without offloading.
pub struct SysfsGpio {
    base: PathBuf,
    bus: Mutex<()>,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_base("/sys/class/gpio")
    }

    /// Root pin access at `base` instead of the real sysfs tree.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            bus: Mutex::new(()),
        }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.base.join(format!("gpio{pin}"))
    }

    fn lock_bus(&self) -> MutexGuard<'_, ()> {
        // A panic while holding the guard poisons the lock but leaves the
        // pin files consistent, so locking through the poison is sound.
        self.bus
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Export `pin`, skipping the write when the kernel already has it.
    pub fn export(&self, pin: u8) -> Result<()> {
        if self.pin_dir(pin).is_dir() {
            debug!(pin, "pin already exported");
            return Ok(());
        }
        fs::write(self.base.join("export"), pin.to_string())?;
        Ok(())
    }

    pub fn set_direction(&self, pin: u8, direction: &str) -> Result<()> {
        fs::write(self.pin_dir(pin).join("direction"), direction)?;
        Ok(())
    }

    pub fn read_value(&self, pin: u8) -> Result<bool> {
        let _bus = self.lock_bus();
        let raw = fs::read_to_string(self.pin_dir(pin).join("value"))?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(StatusError::Sensor(format!(
                "unexpected level {other:?} on pin {pin}"
            ))),
        }
    }

    pub fn write_value(&self, pin: u8, high: bool) -> Result<()> {
        let _bus = self.lock_bus();
        fs::write(
            self.pin_dir(pin).join("value"),
            if high { "1" } else { "0" },
        )?;
        Ok(())
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

/// Door switch input pin.
///
/// The switch shorts the pin to ground while the door is latched, so the
/// released pull-up (high) reads as open. The pull-up bias itself comes
/// from the board's device-tree setup; sysfs cannot configure it.
pub struct GpioDoorSensor {
    gpio: Arc<SysfsGpio>,
    pin: u8,
}

impl GpioDoorSensor {
    pub fn new(gpio: Arc<SysfsGpio>, config: &SensorConfig) -> Result<Self> {
        gpio.export(config.pin)?;
        gpio.set_direction(config.pin, "in")?;
        Ok(Self {
            gpio,
            pin: config.pin,
        })
    }
}

impl DoorSensor for GpioDoorSensor {
    fn read_open(&self) -> Result<bool> {
        self.gpio.read_value(self.pin)
    }
}

/// Status and entrance LED output pins.
pub struct GpioIndicatorPanel {
    gpio: Arc<SysfsGpio>,
}

impl GpioIndicatorPanel {
    pub fn new(gpio: Arc<SysfsGpio>, config: &IndicatorConfig) -> Result<Self> {
        for pin in [config.status_pin, config.entrance_pin, config.ground_pin] {
            gpio.export(pin)?;
            gpio.set_direction(pin, "out")?;
        }
        let panel = Self { gpio };
        // The entrance LED returns through a GPIO instead of a ground rail,
        // so that pin must sit low before the LED can light at all.
        panel.set_pin(config.ground_pin, false)?;
        Ok(panel)
    }
}

impl IndicatorPanel for GpioIndicatorPanel {
    fn set_pin(&self, pin: u8, high: bool) -> Result<()> {
        self.gpio.write_value(pin, high)
    }
}
