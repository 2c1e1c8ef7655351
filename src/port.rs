use crate::{
    error::Result,
    hub::Node,
    literal::{FromLiteral, Literal},
    motor::Motor,
    types::{DataFormat, PortId, PortMode},
};

/// `hub.port`
#[derive(Debug, Clone)]
pub struct Ports {
    node: Node,
}

impl Ports {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// The port called `id`
    #[must_use]
    pub fn get(&self, id: PortId) -> Port {
        Port {
            node: self.node.child(&id.to_string()),
            id,
        }
    }

    /// Port A
    #[must_use]
    pub fn a(&self) -> Port {
        self.get(PortId::A)
    }

    /// Port B
    #[must_use]
    pub fn b(&self) -> Port {
        self.get(PortId::B)
    }

    /// Port C
    #[must_use]
    pub fn c(&self) -> Port {
        self.get(PortId::C)
    }

    /// Port D
    #[must_use]
    pub fn d(&self) -> Port {
        self.get(PortId::D)
    }

    /// Port E
    #[must_use]
    pub fn e(&self) -> Port {
        self.get(PortId::E)
    }

    /// Port F
    #[must_use]
    pub fn f(&self) -> Port {
        self.get(PortId::F)
    }

    /// All six ports in letter order
    #[must_use]
    pub fn all(&self) -> Vec<Port> {
        PortId::ALL.iter().map(|&id| self.get(id)).collect()
    }
}

/// One of the hub's ports, `hub.port.X`
#[derive(Debug, Clone)]
pub struct Port {
    node: Node,
    id: PortId,
}

impl Port {
    /// Which port this is
    #[must_use]
    pub const fn id(&self) -> PortId {
        self.id
    }

    /// The Powered Up device attached to this port
    #[must_use]
    pub fn device(&self) -> Device {
        Device {
            node: self.node.child("device"),
        }
    }

    /// The motor attached to this port
    #[must_use]
    pub fn motor(&self) -> Motor {
        Motor::new(self.node.child("motor"), self.id)
    }

    /// GPIO pin 5, usable when the port is in [`PortMode::Gpio`]
    #[must_use]
    pub fn p5(&self) -> Pin {
        Pin {
            node: self.node.child("p5"),
        }
    }

    /// GPIO pin 6, usable when the port is in [`PortMode::Gpio`]
    #[must_use]
    pub fn p6(&self) -> Pin {
        Pin {
            node: self.node.child("p6"),
        }
    }

    /// Apply a PWM signal (-100 to 100) to the port's power pins
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn pwm(&self, value: i64) -> Result<()> {
        self.node.invoke_unit(self.node.call("pwm").arg(value)).await
    }

    /// Switch the port's operating mode, optionally with a serial baud rate
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn mode(&self, mode: PortMode, baud_rate: Option<u32>) -> Result<()> {
        let call = match baud_rate {
            Some(baud) => self.node.call("mode").arg(mode).arg(baud),
            None => self.node.call("mode").arg(mode),
        };
        self.node.invoke_unit(call).await
    }

    /// Dictionary describing the attached device, `{'type': None}` when there is none
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn info(&self) -> Result<Literal> {
        self.node.get("info").await
    }

    /// Set the baud rate of a port in a serial mode
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn baud(&self, baud: u32) -> Result<()> {
        self.node.invoke_unit(self.node.call("baud").arg(baud)).await
    }

    /// Read up to `n` bytes from a port in a serial mode
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not bytes.
    pub async fn read(&self, n: u32) -> Result<Vec<u8>> {
        self.node.invoke(self.node.call("read").arg(n)).await
    }

    /// Write bytes to a port in a serial mode, returning how many were written
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn write(&self, data: &[u8]) -> Result<i64> {
        self.node.invoke(self.node.call("write").arg(data)).await
    }
}

/// A Powered Up device, `hub.port.X.device`
#[derive(Debug, Clone)]
pub struct Device {
    node: Node,
}

impl Device {
    /// Values provided by the active mode, in the requested format
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a list.
    pub async fn get(&self, format: Option<DataFormat>) -> Result<Vec<Literal>> {
        let call = match format {
            Some(format) => self.node.call("get").arg(format),
            None => self.node.call("get"),
        };
        self.node.invoke(call).await
    }

    /// Currently active mode or mode list
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn mode(&self) -> Result<Literal> {
        self.node.get("mode").await
    }

    /// Select a single mode
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_mode(&self, mode: i64) -> Result<()> {
        self.node.invoke_unit(self.node.call("mode").arg(mode)).await
    }

    /// Select a single mode and write `data` to it
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_mode_with_data(&self, mode: i64, data: &[u8]) -> Result<()> {
        let call = self.node.call("mode").arg(mode).arg(data);
        self.node.invoke_unit(call).await
    }

    /// Select several `(mode, dataset)` values to read together
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_combi_mode(&self, modes: &[(i64, i64)]) -> Result<()> {
        let call = self.node.call("mode").arg(modes.to_vec());
        self.node.invoke_unit(call).await
    }

    /// Apply a PWM signal (-100 to 100) to the device
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn pwm(&self, value: i64) -> Result<()> {
        self.node.invoke_unit(self.node.call("pwm").arg(value)).await
    }

    /// Send raw bytes to the device
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn write_direct(&self, data: &[u8]) -> Result<()> {
        let call = self.node.call("write_direct").arg(data);
        self.node.invoke_unit(call).await
    }
}

/// A GPIO pin, `hub.port.X.p5` or `hub.port.X.p6`
#[derive(Debug, Clone)]
pub struct Pin {
    node: Node,
}

impl Pin {
    /// Pin direction: 0 input, 1 output
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn direction(&self) -> Result<i64> {
        self.node.get("direction").await
    }

    /// Set the pin direction: 0 input, 1 output
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_direction(&self, direction: i64) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("direction").arg(direction))
            .await
    }

    /// Logic level of the pin
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn value(&self) -> Result<i64> {
        self.node.get("value").await
    }

    /// Drive the pin to a logic level
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_value(&self, value: i64) -> Result<()> {
        self.node.invoke_unit(self.node.call("value").arg(value)).await
    }
}

/// Decode a port info dictionary's `type` entry
///
/// Returns `None` when nothing is attached.
///
/// # Errors
///
/// Returns [`crate::HubError::UnexpectedReply`] if the info is not a dictionary with an integer
/// or `None` type.
pub fn device_type(info: &Literal) -> Result<Option<i64>> {
    let kind = info
        .get("type")
        .ok_or_else(|| info.unexpected("port info dict"))?;
    Option::<i64>::from_literal(kind.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hub::Hub, transport::MockTransport};
    use tokio_test::{assert_err, assert_ok};

    fn hub_with(replies: &[&'static str]) -> (Hub, MockTransport) {
        let mock = MockTransport::new();
        for reply in replies {
            mock.push_reply(*reply);
        }
        (Hub::from_transport(mock.clone()), mock)
    }

    #[test]
    fn test_port_paths() {
        let (hub, _mock) = hub_with(&[]);
        let ports = hub.port();
        let letters: Vec<PortId> = ports.all().iter().map(Port::id).collect();
        assert_eq!(letters, PortId::ALL);
        assert_eq!(ports.c().id(), PortId::C);
    }

    #[tokio::test]
    async fn test_port_calls() {
        let (hub, mock) = hub_with(&[
            "None\r\n",
            "{'type': 75, 'speed': 0}\r\n",
            "b'\\x01\\x02'\r\n",
            "2\r\n",
            "None\r\n",
        ]);
        let port = hub.port().e();
        assert_ok!(port.mode(PortMode::FullDuplex, Some(115_200)).await);
        let info = assert_ok!(port.info().await);
        assert_eq!(assert_ok!(device_type(&info)), Some(75));
        assert_eq!(assert_ok!(port.read(2).await), vec![1, 2]);
        assert_eq!(assert_ok!(port.write(b"hi").await), 2);
        assert_ok!(port.mode(PortMode::Default, None).await);
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.port.E.mode(1, 115200)))",
                "print(repr(hub.port.E.info()))",
                "print(repr(hub.port.E.read(2)))",
                "print(repr(hub.port.E.write(b'hi')))",
                "print(repr(hub.port.E.mode(0)))",
            ]
        );
    }

    #[tokio::test]
    async fn test_device_calls() {
        let (hub, mock) = hub_with(&["[12, 50]\r\n", "None\r\n", "None\r\n", "[(0, 0)]\r\n"]);
        let device = hub.port().d().device();
        let values = assert_ok!(device.get(Some(DataFormat::Pct)).await);
        assert_eq!(values, vec![Literal::Int(12), Literal::Int(50)]);
        assert_ok!(device.set_combi_mode(&[(0, 0), (5, 2)]).await);
        assert_ok!(device.set_mode_with_data(5, &[0x01, 0xff]).await);
        assert_eq!(
            assert_ok!(device.mode().await),
            Literal::List(vec![Literal::from((0, 0))])
        );
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.port.D.device.get(1)))",
                "print(repr(hub.port.D.device.mode([(0, 0), (5, 2)])))",
                "print(repr(hub.port.D.device.mode(5, b'\\x01\\xff')))",
                "print(repr(hub.port.D.device.mode()))",
            ]
        );
    }

    #[tokio::test]
    async fn test_pins() {
        let (hub, mock) = hub_with(&["None\r\n", "1\r\n"]);
        let pin = hub.port().a().p6();
        assert_ok!(pin.set_direction(1).await);
        assert_eq!(assert_ok!(pin.value().await), 1);
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.port.A.p6.direction(1)))",
                "print(repr(hub.port.A.p6.value()))",
            ]
        );
    }

    #[test]
    fn test_device_type_without_device() {
        let empty = Literal::parse("{'type': None}").unwrap();
        assert_eq!(device_type(&empty).unwrap(), None);
        assert_err!(device_type(&Literal::Int(3)));
    }
}
