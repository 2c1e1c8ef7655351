use bytes::Bytes;
use std::{
    fmt,
    sync::{Arc, MutexGuard, PoisonError},
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    error::{HubError, Result},
    literal::{FromLiteral, Literal},
    motor::PairTable,
    port::Ports,
    protocol::{decode_reply, eval_request, Call, RemoteHandle},
    serial::{PortScanner, RawRepl},
    subsystems::{Battery, Bluetooth, Buttons, Display, Motion, Os, Sound, Supervision},
    transport::Transport,
    types::{ConnectionParams, DeviceInfo, TimeoutConfig},
};

/// Connection state shared by every facade node of one hub
///
/// The transport lock is held for a whole round trip, so requests never interleave.
pub(crate) struct Session {
    transport: Mutex<Option<Box<dyn Transport>>>,
    pairs: std::sync::Mutex<PairTable>,
}

impl Session {
    fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            pairs: std::sync::Mutex::new(PairTable::default()),
        }
    }

    /// Pair name table; never held across an await
    pub(crate) fn pairs(&self) -> MutexGuard<'_, PairTable> {
        self.pairs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run source text and return what it printed
    pub(crate) async fn execute(&self, source: &str) -> Result<Bytes> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(HubError::Disconnected)?;
        debug!("exec: {source}");
        let reply = transport.execute(source).await?;
        debug!("reply: {:?}", String::from_utf8_lossy(&reply));
        Ok(reply)
    }

    /// Evaluate an expression and decode its printed literal
    pub(crate) async fn eval(&self, expression: &str) -> Result<Literal> {
        let reply = self.execute(&eval_request(expression)).await?;
        decode_reply(&reply)
    }

    async fn close(&self) -> Result<()> {
        let transport = self.transport.lock().await.take();
        if let Some(mut transport) = transport {
            if let Err(e) = transport.close().await {
                error!("Failed to leave the hub's raw REPL: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    async fn is_open(&self) -> bool {
        self.transport.lock().await.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// A remote object: its handle plus the session that reaches it
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) session: Arc<Session>,
    pub(crate) handle: RemoteHandle,
}

impl Node {
    pub(crate) const fn new(session: Arc<Session>, handle: RemoteHandle) -> Self {
        Self { session, handle }
    }

    pub(crate) fn child(&self, attribute: &str) -> Self {
        Self::new(Arc::clone(&self.session), self.handle.child(attribute))
    }

    pub(crate) fn call(&self, method: &str) -> Call {
        Call::method(&self.handle, method)
    }

    /// Evaluate a built call and convert the reply
    pub(crate) async fn invoke<T: FromLiteral>(&self, call: Call) -> Result<T> {
        let expression = call.build()?;
        T::from_literal(self.session.eval(&expression).await?)
    }

    /// Evaluate a call whose reply carries no information
    pub(crate) async fn invoke_unit(&self, call: Call) -> Result<()> {
        let expression = call.build()?;
        let value = self.session.eval(&expression).await?;
        if !value.is_none() {
            warn!("{expression} returned {value}, expected None");
        }
        Ok(())
    }

    /// Call a method without arguments
    pub(crate) async fn get<T: FromLiteral>(&self, method: &str) -> Result<T> {
        self.invoke(self.call(method)).await
    }

    /// Read an attribute value
    pub(crate) async fn attribute<T: FromLiteral>(&self, attribute: &str) -> Result<T> {
        let expression = self.handle.child(attribute);
        T::from_literal(self.session.eval(expression.as_str()).await?)
    }
}

/// Arguments of [`Hub::power_off`]
///
/// Unset fields are left to the firmware's defaults. Setting `timeout` arms the inactivity
/// timer instead of switching off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerOff {
    /// Skip the shutdown animation and sound
    pub fast: Option<bool>,
    /// Reboot after shutting down
    pub restart: Option<bool>,
    /// Inactivity timeout in seconds before the hub shuts down by itself
    pub timeout: Option<i64>,
}

/// Main interface for controlling a hub through its REPL
///
/// `Hub` owns the connection session. Subsystem accessors hand out lightweight proxies that
/// share it; every proxy call is one round trip through the raw REPL. Closing the hub
/// invalidates all of them at once.
///
/// # Examples
///
/// ```no_run
/// use hubrepl::{Hub, Image};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let hub = Hub::connect_first().await?;
///     println!("Firmware {}", hub.version().await?);
///     println!("Battery at {} mV", hub.battery().voltage().await?);
///
///     hub.display().show(&Image::parse(hubrepl::icons::HEART)?).await?;
///     hub.close().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Hub {
    node: Node,
    device_info: Option<DeviceInfo>,
}

impl Hub {
    /// Connect to the first hub found on a USB serial port with default settings
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DeviceNotFound`] if no hub is plugged in, or any error from
    /// opening the port, entering the raw REPL or running the init script.
    pub async fn connect_first() -> Result<Self> {
        Self::connect_with_params(ConnectionParams::default()).await
    }

    /// Connect using `params`; the port is discovered unless `params.device` is set
    ///
    /// # Errors
    ///
    /// Same as [`Hub::connect_first`].
    pub async fn connect_with_params(params: ConnectionParams) -> Result<Self> {
        Self::connect_with_params_and_timeout(params, TimeoutConfig::default()).await
    }

    /// Connect using `params` and custom transport timing
    ///
    /// # Errors
    ///
    /// Same as [`Hub::connect_first`].
    pub async fn connect_with_params_and_timeout(
        params: ConnectionParams,
        timeout_config: TimeoutConfig,
    ) -> Result<Self> {
        let device_info = match &params.device {
            Some(path) => DeviceInfo::new(path.clone()),
            None => PortScanner::find_hub()?,
        };
        Self::connect_to_device_with_timeout(device_info, params, timeout_config).await
    }

    /// Connect to a specific serial port
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened, the hub does not enter the raw REPL,
    /// or the init script fails.
    pub async fn connect_to_device(
        device_info: DeviceInfo,
        params: ConnectionParams,
    ) -> Result<Self> {
        Self::connect_to_device_with_timeout(device_info, params, TimeoutConfig::default()).await
    }

    /// Connect to a specific serial port with custom transport timing
    ///
    /// # Errors
    ///
    /// Same as [`Hub::connect_to_device`].
    pub async fn connect_to_device_with_timeout(
        device_info: DeviceInfo,
        params: ConnectionParams,
        timeout_config: TimeoutConfig,
    ) -> Result<Self> {
        let repl = RawRepl::open(&device_info.path, &params, timeout_config)
            .await
            .inspect_err(|e| error!("Could not open hub at {}: {e}", device_info.path))?;
        info!("Connected to hub at {}", device_info.path);

        let hub = Self::with_transport(Box::new(repl), Some(device_info));
        if !params.init_script.is_empty() {
            if let Err(e) = hub.exec(&params.init_script).await {
                error!("Init script failed: {e}");
                if let Err(close_error) = hub.close().await {
                    warn!("Ignoring close failure after init error: {close_error}");
                }
                return Err(e);
            }
        }
        Ok(hub)
    }

    /// Drive a hub through an already open transport
    ///
    /// No init script is run; the caller decides what the interpreter has imported.
    pub fn from_transport(transport: impl Transport + 'static) -> Self {
        Self::with_transport(Box::new(transport), None)
    }

    fn with_transport(transport: Box<dyn Transport>, device_info: Option<DeviceInfo>) -> Self {
        let session = Arc::new(Session::new(transport));
        Self {
            node: Node::new(session, RemoteHandle::new("hub")),
            device_info,
        }
    }

    /// Serial port this hub was opened on, if any
    #[must_use]
    pub const fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// Check whether the session is still open
    pub async fn is_connected(&self) -> bool {
        self.node.session.is_open().await
    }

    /// Leave the raw REPL and release the transport
    ///
    /// Every proxy obtained from this hub fails with [`HubError::Disconnected`] afterwards.
    /// Live motor pairs are not unpaired. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if leaving the raw REPL fails.
    pub async fn close(&self) -> Result<()> {
        info!("Closing hub connection");
        self.node.session.close().await
    }

    /// Run source text in the hub's interpreter and return what it printed
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RemoteEvaluation`] if the code raised, or a connection error.
    pub async fn exec(&self, source: &str) -> Result<Bytes> {
        self.node.session.execute(source).await
    }

    /// Evaluate an expression on the hub and decode its value
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RemoteEvaluation`] if the expression raised or its value has no
    /// literal form, or a connection error.
    pub async fn eval(&self, expression: &str) -> Result<Literal> {
        self.node.session.eval(expression).await
    }

    /// Evaluate a built call on the hub
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidArgument`] if the call cannot be built, otherwise the same as
    /// [`Hub::eval`].
    pub async fn call(&self, call: Call) -> Result<Literal> {
        self.node.invoke(call).await
    }

    /// Firmware version, e.g. `v1.0.06.0034-b0c335b`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a string.
    pub async fn version(&self) -> Result<String> {
        self.node.attribute("__version__").await
    }

    /// Persistent configuration dictionary
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn config(&self) -> Result<Literal> {
        self.node.attribute("config").await
    }

    /// Hardware and firmware information
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn info(&self) -> Result<Literal> {
        self.node.get("info").await
    }

    /// State of internal sensors, external devices and the display
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn status(&self) -> Result<Literal> {
        self.node.get("status").await
    }

    /// Turn the hub off, or arm its inactivity timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails. A hub that switches off may break the
    /// connection before answering.
    pub async fn power_off(&self, options: PowerOff) -> Result<()> {
        let call = self
            .node
            .call("power_off")
            .kwarg_opt("fast", options.fast)
            .kwarg_opt("restart", options.restart)
            .kwarg_opt("timeout", options.timeout);
        self.node.invoke_unit(call).await
    }

    /// Hub temperature in degrees Celsius
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a number.
    pub async fn temperature(&self) -> Result<f64> {
        self.node.get("temperature").await
    }

    /// Set the center button light to a color code (0 off, 1 pink ... 9 red, 10 white)
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn led(&self, color: i64) -> Result<()> {
        self.node.invoke_unit(self.node.call("led").arg(color)).await
    }

    /// Set the center button light to an RGB color
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn led_rgb(&self, red: u8, green: u8, blue: u8) -> Result<()> {
        let call = self.node.call("led").arg(red).arg(green).arg(blue);
        self.node.invoke_unit(call).await
    }

    /// `hub.battery`
    #[must_use]
    pub fn battery(&self) -> Battery {
        Battery::new(self.node.child("battery"))
    }

    /// `hub.bluetooth`
    #[must_use]
    pub fn bluetooth(&self) -> Bluetooth {
        Bluetooth::new(self.node.child("bluetooth"))
    }

    /// `hub.button`
    #[must_use]
    pub fn button(&self) -> Buttons {
        Buttons::new(self.node.child("button"))
    }

    /// `hub.display`
    #[must_use]
    pub fn display(&self) -> Display {
        Display::new(self.node.child("display"))
    }

    /// `hub.motion`
    #[must_use]
    pub fn motion(&self) -> Motion {
        Motion::new(self.node.child("motion"))
    }

    /// `hub.port`
    #[must_use]
    pub fn port(&self) -> Ports {
        Ports::new(self.node.child("port"))
    }

    /// `hub.sound`
    #[must_use]
    pub fn sound(&self) -> Sound {
        Sound::new(self.node.child("sound"))
    }

    /// `hub.supervision`
    #[must_use]
    pub fn supervision(&self) -> Supervision {
        Supervision::new(self.node.child("supervision"))
    }

    /// The interpreter's `os` module
    #[must_use]
    pub fn os(&self) -> Os {
        Os::new(Node::new(
            Arc::clone(&self.node.session),
            RemoteHandle::new("os"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use tokio_test::{assert_err, assert_ok};

    fn hub_with(replies: &[&'static str]) -> (Hub, MockTransport) {
        let mock = MockTransport::new();
        for reply in replies {
            mock.push_reply(*reply);
        }
        (Hub::from_transport(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_attributes_and_calls() {
        let (hub, mock) = hub_with(&[
            "'v1.0.06.0034-b0c335b'\r\n",
            "{'name': 'LEGO Hub'}\r\n",
            "28.5\r\n",
        ]);
        assert_eq!(assert_ok!(hub.version().await), "v1.0.06.0034-b0c335b");
        let config = assert_ok!(hub.config().await);
        assert_eq!(config.get("name").and_then(Literal::as_str), Some("LEGO Hub"));
        assert!((assert_ok!(hub.temperature().await) - 28.5).abs() < f64::EPSILON);

        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.__version__))",
                "print(repr(hub.config))",
                "print(repr(hub.temperature()))",
            ]
        );
    }

    #[tokio::test]
    async fn test_setters_and_options() {
        let (hub, mock) = hub_with(&["None\r\n", "None\r\n", "None\r\n", "None\r\n"]);
        assert_ok!(hub.led(9).await);
        assert_ok!(hub.led_rgb(255, 0, 128).await);
        assert_ok!(
            hub.power_off(PowerOff {
                fast: Some(true),
                restart: Some(false),
                ..PowerOff::default()
            })
            .await
        );
        assert_ok!(
            hub.power_off(PowerOff {
                timeout: Some(600),
                ..PowerOff::default()
            })
            .await
        );
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.led(9)))",
                "print(repr(hub.led(255, 0, 128)))",
                "print(repr(hub.power_off(fast=True, restart=False)))",
                "print(repr(hub.power_off(timeout=600)))",
            ]
        );
    }

    #[tokio::test]
    async fn test_remote_exception_is_not_swallowed() {
        let mock = MockTransport::new();
        mock.push_exception("Traceback (most recent call last):\r\nOSError: [Errno 19] ENODEV\r\n");
        let hub = Hub::from_transport(mock.clone());

        let err = assert_err!(hub.info().await);
        assert!(err.is_remote_error());
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_keeps_raw_bytes() {
        let (hub, _mock) = hub_with(&["<Image object at 20009a30>\r\n"]);
        let err = assert_err!(hub.eval("hub.Image.HEART").await);
        assert!(err.is_remote_error());
        assert!(err.reply().is_some_and(|r| r.starts_with(b"<Image")));
    }

    #[tokio::test]
    async fn test_exec_returns_output() {
        let (hub, mock) = hub_with(&["hello\r\n"]);
        let out = assert_ok!(hub.exec("print('hello')").await);
        assert_eq!(out, Bytes::from("hello\r\n"));
        assert_eq!(mock.requests(), ["print('hello')"]);
    }

    #[tokio::test]
    async fn test_close_invalidates_every_proxy() {
        let (hub, mock) = hub_with(&["8294\r\n"]);
        let battery = hub.battery();
        assert!(hub.is_connected().await);

        assert_ok!(hub.close().await);
        assert!(mock.is_closed());
        assert!(!hub.is_connected().await);
        assert_ok!(hub.close().await);

        let err = assert_err!(battery.voltage().await);
        assert!(matches!(err, HubError::Disconnected));
        assert!(mock.requests().is_empty());
        assert_eq!(mock.pending_replies(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let mock = MockTransport::new();
        for n in 0..8 {
            mock.push_reply(format!("{n}\r\n"));
        }
        let hub = Hub::from_transport(mock.clone());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let battery = hub.battery();
            tasks.push(tokio::spawn(async move { battery.voltage().await }));
        }
        let mut values = Vec::new();
        for task in tasks {
            values.push(assert_ok!(assert_ok!(task.await)));
        }
        values.sort_unstable();
        assert_eq!(values, (0..8).collect::<Vec<i64>>());
        assert_eq!(mock.requests().len(), 8);
    }

    #[tokio::test]
    async fn test_device_info_absent_for_custom_transport() {
        let (hub, _mock) = hub_with(&[]);
        assert!(hub.device_info().is_none());
    }
}
