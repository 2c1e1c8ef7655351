use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{literal::Literal, USB_PID, USB_VID};

/// One of the six ports on the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortId {
    /// Port A
    A,
    /// Port B
    B,
    /// Port C
    C,
    /// Port D
    D,
    /// Port E
    E,
    /// Port F
    F,
}

impl PortId {
    /// All ports in letter order
    pub const ALL: [Self; 6] = [Self::A, Self::B, Self::C, Self::D, Self::E, Self::F];

    /// The port letter as used in the hub's namespace
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A side of the hub, used for orientation and display alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Face {
    /// The side with the matrix display
    Top = 0,
    /// The side with the USB port
    Front = 1,
    /// The side with ports B, D, and F
    Right = 2,
    /// The side of the battery compartment
    Bottom = 3,
    /// The side with the speaker
    Back = 4,
    /// The side with ports A, C, and E
    Left = 5,
}

impl Face {
    /// Decode the firmware's face number
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Top),
            1 => Some(Self::Front),
            2 => Some(Self::Right),
            3 => Some(Self::Bottom),
            4 => Some(Self::Back),
            5 => Some(Self::Left),
            _ => None,
        }
    }
}

impl From<Face> for Literal {
    fn from(face: Face) -> Self {
        Self::Int(face as i64)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "Top"),
            Self::Front => write!(f, "Front"),
            Self::Right => write!(f, "Right"),
            Self::Bottom => write!(f, "Bottom"),
            Self::Back => write!(f, "Back"),
            Self::Left => write!(f, "Left"),
        }
    }
}

/// Battery error states reported in `hub.battery.info()['error_state']`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    /// The battery is happy
    NoError = 0,
    /// The hub temperature is outside of the critical range
    HubTemperatureCriticalOutOfRange = -1,
    /// The battery temperature is outside of the expected range
    TemperatureOutOfRange = -2,
    /// The battery temperature sensor is not working
    TemperatureSensorFail = -3,
    /// Something is wrong with the battery
    BadBattery = -4,
    /// The battery voltage is too low
    VoltageTooLow = -5,
    /// No battery detected
    Missing = -6,
}

impl From<i64> for BatteryStatus {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::NoError,
            -1 => Self::HubTemperatureCriticalOutOfRange,
            -2 => Self::TemperatureOutOfRange,
            -3 => Self::TemperatureSensorFail,
            -5 => Self::VoltageTooLow,
            -6 => Self::Missing,
            _ => Self::BadBattery,
        }
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "No Error"),
            Self::HubTemperatureCriticalOutOfRange => write!(f, "Hub Temperature Critical"),
            Self::TemperatureOutOfRange => write!(f, "Battery Temperature Out Of Range"),
            Self::TemperatureSensorFail => write!(f, "Temperature Sensor Failure"),
            Self::BadBattery => write!(f, "Bad Battery"),
            Self::VoltageTooLow => write!(f, "Voltage Too Low"),
            Self::Missing => write!(f, "Battery Missing"),
        }
    }
}

/// Charger type detected by `hub.battery.charger_detect()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargerType {
    /// No charger detected
    None = 0,
    /// Standard downstream port (typical USB port)
    StandardDownstream = 1,
    /// Charging downstream port (wall charger)
    ChargingDownstream = 2,
    /// Dedicated charging port (high current USB port)
    DedicatedCharging = 3,
    /// Code not known to this library
    Unknown = -1,
}

impl From<i64> for ChargerType {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::None,
            1 => Self::StandardDownstream,
            2 => Self::ChargingDownstream,
            3 => Self::DedicatedCharging,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ChargerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::StandardDownstream => write!(f, "USB SDP"),
            Self::ChargingDownstream => write!(f, "USB CDP"),
            Self::DedicatedCharging => write!(f, "USB DCP"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Charging state reported in `hub.battery.info()['charger_state']`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargerState {
    /// There was a problem charging the battery
    Fail = -1,
    /// The battery is discharging
    Discharging = 0,
    /// The battery is charging
    Charging = 1,
    /// The battery is fully charged
    Completed = 2,
}

impl From<i64> for ChargerState {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Discharging,
            1 => Self::Charging,
            2 => Self::Completed,
            _ => Self::Fail,
        }
    }
}

/// Gestures reported by `hub.motion.gesture()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gesture {
    /// The hub was tapped
    Tapped = 0,
    /// The hub was quickly tapped twice
    DoubleTapped = 1,
    /// The hub was shaken
    Shake = 2,
    /// The hub fell
    Freefall = 3,
}

impl Gesture {
    /// Decode the firmware's gesture number
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Tapped),
            1 => Some(Self::DoubleTapped),
            2 => Some(Self::Shake),
            3 => Some(Self::Freefall),
            _ => None,
        }
    }
}

/// Port attach/detach events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortEvent {
    /// A device was detached from the port
    Detached = 0,
    /// A new device is attached to the port
    Attached = 1,
}

/// Operating mode of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortMode {
    /// Powered Up compatible
    Default = 0,
    /// Raw full duplex logic level serial port
    FullDuplex = 1,
    /// Raw half duplex differential level serial port
    HalfDuplex = 2,
    /// General purpose input and output pins
    Gpio = 3,
}

impl From<PortMode> for Literal {
    fn from(mode: PortMode) -> Self {
        Self::Int(mode as i64)
    }
}

/// Data format for `Device::get`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    /// No particular unit
    Raw = 0,
    /// Percentage
    Pct = 1,
    /// SI units, if available
    Si = 2,
}

impl From<DataFormat> for Literal {
    fn from(format: DataFormat) -> Self {
        Self::Int(format as i64)
    }
}

/// What `Motor::busy` checks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BusyType {
    /// The port is busy configuring the device mode
    #[default]
    Mode = 0,
    /// The motor is busy executing a command
    Motor = 1,
}

impl From<BusyType> for Literal {
    fn from(busy: BusyType) -> Self {
        Self::Int(busy as i64)
    }
}

/// How a motor stops at the end of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopAction {
    /// The motor floats
    Float = 0,
    /// The motor brakes
    Brake = 1,
    /// The motor holds position
    Hold = 2,
}

impl From<StopAction> for Literal {
    fn from(stop: StopAction) -> Self {
        Self::Int(stop as i64)
    }
}

/// How a motor command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorEvent {
    /// The command completed successfully
    Completed = 0,
    /// The command was interrupted
    Interrupted = 1,
    /// The command stopped because the motor stalled
    Stalled = 2,
}

impl MotorEvent {
    /// Decode the firmware's event number
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Completed),
            1 => Some(Self::Interrupted),
            2 => Some(Self::Stalled),
            _ => None,
        }
    }
}

/// Wave form for `Sound::beep`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    /// Smooth sine wave
    #[default]
    Sine = 0,
    /// Loud and raw square wave
    Square = 1,
    /// Triangular wave
    Triangle = 2,
    /// Sawtooth wave
    Sawtooth = 3,
}

impl From<Waveform> for Literal {
    fn from(waveform: Waveform) -> Self {
        Self::Int(waveform as i64)
    }
}

/// A serial port found during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Path or name used to open the port
    pub path: String,
    /// USB vendor id, if the port is a USB device
    pub vid: Option<u16>,
    /// USB product id, if the port is a USB device
    pub pid: Option<u16>,
    /// USB serial number
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl DeviceInfo {
    /// Create device info for a port with no USB metadata
    #[must_use]
    pub const fn new(path: String) -> Self {
        Self {
            path,
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Create device info for a USB port
    #[must_use]
    pub const fn usb(path: String, vid: u16, pid: u16) -> Self {
        Self {
            path,
            vid: Some(vid),
            pid: Some(pid),
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Whether the vendor and product ids are those of the hub
    #[must_use]
    pub fn is_hub(&self) -> bool {
        self.vid == Some(USB_VID) && self.pid == Some(USB_PID)
    }
}

/// Connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Serial port to open; discovered by USB id when `None`
    pub device: Option<String>,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Soft reset the interpreter after entering the raw REPL
    pub soft_reset: bool,
    /// Source executed once the raw REPL is ready
    pub init_script: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: 115_200,
            soft_reset: true,
            init_script: "import hub; Image = hub.Image; import os".to_string(),
        }
    }
}

/// Timing of the raw REPL transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// How long to wait for the raw REPL banner and soft reboot
    pub enter_raw_repl_timeout_ms: u64,
    /// How long to wait for each part of a command's reply
    pub command_timeout_ms: u64,
    /// Quiet period that ends draining of stale input
    pub drain_timeout_ms: u64,
    /// Source is written in chunks of this many bytes
    pub write_chunk_size: usize,
    /// Pause between source chunks so the hub's input buffer keeps up
    pub write_chunk_delay_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enter_raw_repl_timeout_ms: 10_000,
            command_timeout_ms: 30_000,
            drain_timeout_ms: 100,
            write_chunk_size: 256,
            write_chunk_delay_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_codes() {
        assert_eq!(Face::from_code(0), Some(Face::Top));
        assert_eq!(Face::from_code(5), Some(Face::Left));
        assert_eq!(Face::from_code(6), None);
        assert_eq!(Literal::from(Face::Back), Literal::Int(4));
    }

    #[test]
    fn test_charger_and_battery_from_i64() {
        assert_eq!(ChargerType::from(2), ChargerType::ChargingDownstream);
        assert_eq!(ChargerType::from(42), ChargerType::Unknown);
        assert_eq!(BatteryStatus::from(-6), BatteryStatus::Missing);
        assert_eq!(ChargerState::from(-1), ChargerState::Fail);
        assert_eq!(format!("{}", ChargerType::DedicatedCharging), "USB DCP");
    }

    #[test]
    fn test_port_letters() {
        let letters: String = PortId::ALL.iter().map(|p| p.letter()).collect();
        assert_eq!(letters, "ABCDEF");
        assert_eq!(PortId::C.to_string(), "C");
    }

    #[test]
    fn test_device_info_is_hub() {
        assert!(DeviceInfo::usb("/dev/ttyACM0".to_string(), 0x0694, 0x0010).is_hub());
        assert!(!DeviceInfo::usb("/dev/ttyACM1".to_string(), 0x0694, 0x0009).is_hub());
        assert!(!DeviceInfo::new("/dev/ttyS0".to_string()).is_hub());
    }

    #[test]
    fn test_connection_params_default() {
        let params = ConnectionParams::default();
        assert!(params.device.is_none());
        assert_eq!(params.baud_rate, 115_200);
        assert!(params.soft_reset);
        assert!(params.init_script.contains("import hub"));
    }

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();

        assert_eq!(config.enter_raw_repl_timeout_ms, 10_000);
        assert_eq!(config.command_timeout_ms, 30_000);
        assert_eq!(config.drain_timeout_ms, 100);
        assert_eq!(config.write_chunk_size, 256);
        assert_eq!(config.write_chunk_delay_ms, 10);
    }
}
