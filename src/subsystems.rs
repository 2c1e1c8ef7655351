use crate::{
    error::Result,
    hub::Node,
    image::Image,
    literal::{FromLiteral, Literal},
    types::{ChargerType, Face, Gesture, Waveform},
};

fn face_from(literal: &Literal) -> Result<Face> {
    literal
        .as_i64()
        .and_then(Face::from_code)
        .ok_or_else(|| literal.unexpected("face number 0-5"))
}

/// `hub.battery`
#[derive(Debug, Clone)]
pub struct Battery {
    node: Node,
}

impl Battery {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Battery voltage in mV
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn voltage(&self) -> Result<i64> {
        self.node.get("voltage").await
    }

    /// Current flowing out of the battery in mA
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn current(&self) -> Result<i64> {
        self.node.get("current").await
    }

    /// Remaining capacity as a percentage of a full charge
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn capacity_left(&self) -> Result<i64> {
        self.node.get("capacity_left").await
    }

    /// Battery temperature in degrees Celsius
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a number.
    pub async fn temperature(&self) -> Result<f64> {
        self.node.get("temperature").await
    }

    /// Type of the connected charger, `None` when no charger is detected
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is neither `False` nor an integer.
    pub async fn charger_detect(&self) -> Result<Option<ChargerType>> {
        let value: Literal = self.node.get("charger_detect").await?;
        match value {
            Literal::Bool(false) => Ok(None),
            Literal::Int(code) => Ok(Some(ChargerType::from(code))),
            other => Err(other.unexpected("False or charger type")),
        }
    }

    /// Dictionary of battery state, including `error_state` and `charger_state`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn info(&self) -> Result<Literal> {
        self.node.get("info").await
    }
}

/// `hub.bluetooth`
#[derive(Debug, Clone)]
pub struct Bluetooth {
    node: Node,
}

impl Bluetooth {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Seconds the hub stays discoverable, 0 once it no longer is
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn discoverable(&self) -> Result<i64> {
        self.node.get("discoverable").await
    }

    /// Make the hub discoverable for `seconds`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_discoverable(&self, seconds: i64) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("discoverable").arg(seconds))
            .await
    }

    /// Connection information, or `None` without a connection
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn info(&self) -> Result<Option<Literal>> {
        self.node.get("info").await
    }

    /// Remove a paired device by its address
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a bool.
    pub async fn forget(&self, address: &str) -> Result<bool> {
        self.node.invoke(self.node.call("forget").arg(address)).await
    }

    /// Seconds the hub keeps advertising, 0 once it stopped
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn lwp_advertise(&self) -> Result<i64> {
        self.node.get("lwp_advertise").await
    }

    /// Advertise with the LEGO Wireless Protocol for `seconds`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_lwp_advertise(&self, seconds: i64) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("lwp_advertise").arg(seconds))
            .await
    }

    /// Whether wireless protocol messages bypass the running program
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a bool.
    pub async fn lwp_bypass(&self) -> Result<bool> {
        self.node.get("lwp_bypass").await
    }

    /// Set the wireless protocol bypass
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_lwp_bypass(&self, bypass: bool) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("lwp_bypass").arg(bypass))
            .await
    }
}

/// `hub.button`
#[derive(Debug, Clone)]
pub struct Buttons {
    node: Node,
}

impl Buttons {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Left button
    #[must_use]
    pub fn left(&self) -> Button {
        Button::new(self.node.child("left"))
    }

    /// Right button
    #[must_use]
    pub fn right(&self) -> Button {
        Button::new(self.node.child("right"))
    }

    /// Center button
    #[must_use]
    pub fn center(&self) -> Button {
        Button::new(self.node.child("center"))
    }

    /// Bluetooth connect button
    #[must_use]
    pub fn connect(&self) -> Button {
        Button::new(self.node.child("connect"))
    }
}

/// One of the hub's buttons
#[derive(Debug, Clone)]
pub struct Button {
    node: Node,
}

impl Button {
    const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Whether the button is pressed right now
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a bool.
    pub async fn is_pressed(&self) -> Result<bool> {
        self.node.get("is_pressed").await
    }

    /// Whether the button was pressed since the last call
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a bool.
    pub async fn was_pressed(&self) -> Result<bool> {
        self.node.get("was_pressed").await
    }

    /// Number of presses since the last call
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn presses(&self) -> Result<i64> {
        self.node.get("presses").await
    }
}

/// Keyword arguments of [`Display::show_sequence`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowOptions {
    /// Milliseconds between images
    pub delay: Option<i64>,
    /// Clear the display after the last image
    pub clear: Option<bool>,
    /// Block until all images are shown
    pub wait: Option<bool>,
    /// Repeat the sequence forever
    pub looping: Option<bool>,
    /// Transition between images, 0-6
    pub fade: Option<i64>,
}

/// `hub.display`, the 5x5 light matrix
#[derive(Debug, Clone)]
pub struct Display {
    node: Node,
}

impl Display {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Switch all pixels off
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn clear(&self) -> Result<()> {
        self.node.invoke_unit(self.node.call("clear")).await
    }

    /// Rotate the display by `degrees` (multiples of 90)
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn rotation(&self, degrees: i64) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("rotation").arg(degrees))
            .await
    }

    /// Side of the hub that is the display's top
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a face number.
    pub async fn align(&self) -> Result<Face> {
        let value: Literal = self.node.get("align").await?;
        face_from(&value)
    }

    /// Make `face` the top of the display
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_align(&self, face: Face) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("align").arg(face))
            .await
    }

    /// Whether brightness is inverted
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a bool.
    pub async fn invert(&self) -> Result<bool> {
        self.node.get("invert").await
    }

    /// Invert brightness of all pixels
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_invert(&self, invert: bool) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("invert").arg(invert))
            .await
    }

    /// Brightness of the pixel at column `x`, row `y`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn pixel(&self, x: i64, y: i64) -> Result<i64> {
        self.node
            .invoke(self.node.call("pixel").arg(x).arg(y))
            .await
    }

    /// Set the brightness (0-9) of the pixel at column `x`, row `y`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_pixel(&self, x: i64, y: i64, brightness: u8) -> Result<()> {
        let call = self.node.call("pixel").arg(x).arg(y).arg(brightness);
        self.node.invoke_unit(call).await
    }

    /// Show one image
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn show(&self, image: &Image) -> Result<()> {
        let call = self.node.call("show").expr_arg(image.to_string());
        self.node.invoke_unit(call).await
    }

    /// Scroll a text across the display
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn show_text(&self, text: &str) -> Result<()> {
        self.node.invoke_unit(self.node.call("show").arg(text)).await
    }

    /// Show a sequence of images
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn show_sequence(&self, images: &[Image], options: ShowOptions) -> Result<()> {
        let list = images
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let call = self
            .node
            .call("show")
            .expr_arg(format!("[{list}]"))
            .kwarg_opt("delay", options.delay)
            .kwarg_opt("clear", options.clear)
            .kwarg_opt("wait", options.wait)
            .kwarg_opt("loop", options.looping)
            .kwarg_opt("fade", options.fade);
        self.node.invoke_unit(call).await
    }
}

/// `hub.motion`, the gyro and accelerometer
#[derive(Debug, Clone)]
pub struct Motion {
    node: Node,
}

impl Motion {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Acceleration along x, y and z in cm/s²
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not three integers.
    pub async fn accelerometer(&self, filtered: bool) -> Result<(i64, i64, i64)> {
        self.node
            .invoke(self.node.call("accelerometer").arg(filtered))
            .await
    }

    /// Angular velocity around x, y and z in degrees per second
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not three integers.
    pub async fn gyroscope(&self, filtered: bool) -> Result<(i64, i64, i64)> {
        self.node
            .invoke(self.node.call("gyroscope").arg(filtered))
            .await
    }

    /// Tell the hub how it is mounted in a model
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn align_to_model(&self, top: Face, front: Face) -> Result<()> {
        let call = self.node.call("align_to_model").arg(top).arg(front);
        self.node.invoke_unit(call).await
    }

    /// Yaw, pitch and roll in degrees
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not three integers.
    pub async fn yaw_pitch_roll(&self) -> Result<(i64, i64, i64)> {
        self.node.get("yaw_pitch_roll").await
    }

    /// Set the current yaw to `degrees` (-180 to 179)
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn preset_yaw(&self, degrees: i64) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("yaw_pitch_roll").arg(degrees))
            .await
    }

    /// Adjust the gain of the yaw axis
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_yaw_correction(&self, correction: f64) -> Result<()> {
        let call = self
            .node
            .call("yaw_pitch_roll")
            .kwarg("yaw_correction", correction);
        self.node.invoke_unit(call).await
    }

    /// Side of the hub facing up
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a face number.
    pub async fn orientation(&self) -> Result<Face> {
        let value: Literal = self.node.get("orientation").await?;
        face_from(&value)
    }

    /// Most recent gesture since the last call, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a gesture number.
    pub async fn gesture(&self) -> Result<Option<Gesture>> {
        let value: Option<i64> = self.node.get("gesture").await?;
        value
            .map(|code| {
                Gesture::from_code(code)
                    .ok_or_else(|| Literal::Int(code).unexpected("gesture number 0-3"))
            })
            .transpose()
    }
}

/// `hub.sound`
#[derive(Debug, Clone)]
pub struct Sound {
    node: Node,
}

impl Sound {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Current volume, 0-10
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not an integer.
    pub async fn volume(&self) -> Result<i64> {
        self.node.get("volume").await
    }

    /// Set the volume, 0-10
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_volume(&self, volume: i64) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("volume").arg(volume))
            .await
    }

    /// Beep at `frequency` Hz for `time` ms
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn beep(&self, frequency: i64, time: i64, waveform: Waveform) -> Result<()> {
        let call = self
            .node
            .call("beep")
            .arg(frequency)
            .arg(time)
            .arg(waveform);
        self.node.invoke_unit(call).await
    }

    /// Play a sound file from the hub's file system at `rate` samples per second
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn play(&self, filename: &str, rate: i64) -> Result<()> {
        let call = self.node.call("play").arg(filename).arg(rate);
        self.node.invoke_unit(call).await
    }
}

/// `hub.supervision`
#[derive(Debug, Clone)]
pub struct Supervision {
    node: Node,
}

impl Supervision {
    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    /// Dictionary with current peaks, temperature and continuous current flags
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn info(&self) -> Result<Literal> {
        self.node.get("info").await
    }
}

/// The interpreter's `os` module
#[derive(Debug, Clone)]
pub struct Os {
    node: Node,
}

impl Os {
    /// Path separator on the hub
    pub const SEP: &'static str = "/";

    pub(crate) const fn new(node: Node) -> Self {
        Self { node }
    }

    async fn path_op(&self, method: &str, path: &str) -> Result<()> {
        self.node
            .invoke_unit(self.node.call(method).arg(path))
            .await
    }

    /// Delete a file
    ///
    /// # Errors
    ///
    /// Returns [`crate::HubError::RemoteEvaluation`] if the file cannot be removed.
    pub async fn remove(&self, path: &str) -> Result<()> {
        self.path_op("remove", path).await
    }

    /// Change the working directory
    ///
    /// # Errors
    ///
    /// Returns [`crate::HubError::RemoteEvaluation`] if the directory does not exist.
    pub async fn chdir(&self, path: &str) -> Result<()> {
        self.path_op("chdir", path).await
    }

    /// Current working directory
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a string.
    pub async fn getcwd(&self) -> Result<String> {
        self.node.get("getcwd").await
    }

    /// Entries of `path`, or of the working directory
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a list of strings.
    pub async fn listdir(&self, path: Option<&str>) -> Result<Vec<String>> {
        let call = match path {
            Some(path) => self.node.call("listdir").arg(path),
            None => self.node.call("listdir"),
        };
        self.node.invoke(call).await
    }

    /// Create a directory
    ///
    /// # Errors
    ///
    /// Returns [`crate::HubError::RemoteEvaluation`] if the directory cannot be created.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        self.path_op("mkdir", path).await
    }

    /// Rename a file or directory
    ///
    /// # Errors
    ///
    /// Returns [`crate::HubError::RemoteEvaluation`] if the rename fails.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let call = self.node.call("rename").arg(from).arg(to);
        self.node.invoke_unit(call).await
    }

    /// Remove an empty directory
    ///
    /// # Errors
    ///
    /// Returns [`crate::HubError::RemoteEvaluation`] if the directory cannot be removed.
    pub async fn rmdir(&self, path: &str) -> Result<()> {
        self.path_op("rmdir", path).await
    }

    /// `stat` tuple of a path: mode, inode, device, links, uid, gid, size, atime, mtime, ctime
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the path does not exist.
    pub async fn stat(&self, path: &str) -> Result<Vec<i64>> {
        self.node.invoke(self.node.call("stat").arg(path)).await
    }

    /// File system statistics for the volume holding `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn statvfs(&self, path: &str) -> Result<Vec<i64>> {
        self.node.invoke(self.node.call("statvfs").arg(path)).await
    }

    /// Flush file system buffers
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn sync(&self) -> Result<()> {
        self.node.invoke_unit(self.node.call("sync")).await
    }

    /// System name, node name, release, version and machine
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn uname(&self) -> Result<Vec<String>> {
        let expression = format!("tuple({}.uname())", self.node.handle);
        let value = self.node.session.eval(&expression).await?;
        Vec::<String>::from_literal(value)
    }

    /// Delete a file
    ///
    /// # Errors
    ///
    /// Returns [`crate::HubError::RemoteEvaluation`] if the file cannot be removed.
    pub async fn unlink(&self, path: &str) -> Result<()> {
        self.path_op("unlink", path).await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::HubError,
        hub::Hub,
        image::{icons, Image},
        literal::Literal,
        transport::MockTransport,
        types::{ChargerType, Face, Gesture, Waveform},
    };
    use super::ShowOptions;
    use tokio_test::{assert_err, assert_ok};

    fn hub_with(replies: &[&'static str]) -> (Hub, MockTransport) {
        let mock = MockTransport::new();
        for reply in replies {
            mock.push_reply(*reply);
        }
        (Hub::from_transport(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_battery_voltage() {
        let (hub, mock) = hub_with(&["8294"]);
        assert_eq!(assert_ok!(hub.battery().voltage().await), 8294);
        assert_eq!(mock.requests(), ["print(repr(hub.battery.voltage()))"]);
    }

    #[tokio::test]
    async fn test_battery_charger_detect() {
        let (hub, _mock) = hub_with(&["False\r\n", "2\r\n", "'usb'\r\n"]);
        let battery = hub.battery();
        assert_eq!(assert_ok!(battery.charger_detect().await), None);
        assert_eq!(
            assert_ok!(battery.charger_detect().await),
            Some(ChargerType::ChargingDownstream)
        );
        let err = assert_err!(battery.charger_detect().await);
        assert!(matches!(err, HubError::UnexpectedReply { .. }));
    }

    #[tokio::test]
    async fn test_battery_info_dict() {
        let (hub, _mock) = hub_with(&[
            "{'error_state': 0, 'charger_state': 1, 'battery_capacity_left': 97}\r\n",
        ]);
        let info = assert_ok!(hub.battery().info().await);
        assert_eq!(info.get("charger_state").and_then(Literal::as_i64), Some(1));
    }

    #[tokio::test]
    async fn test_typed_getter_rejects_wrong_shape() {
        let (hub, _mock) = hub_with(&["'8294'\r\n"]);
        let err = assert_err!(hub.battery().voltage().await);
        assert!(matches!(err, HubError::UnexpectedReply { expected: "int", .. }));
    }

    #[tokio::test]
    async fn test_bluetooth_getters_and_setters() {
        let (hub, mock) = hub_with(&["0\r\n", "None\r\n", "None\r\n", "True\r\n", "None\r\n"]);
        let bluetooth = hub.bluetooth();
        assert_eq!(assert_ok!(bluetooth.discoverable().await), 0);
        assert_ok!(bluetooth.set_discoverable(30).await);
        assert_eq!(assert_ok!(bluetooth.info().await), None);
        assert!(assert_ok!(bluetooth.forget("A0:E6:F8:1E:13:45").await));
        assert_ok!(bluetooth.set_lwp_bypass(true).await);
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.bluetooth.discoverable()))",
                "print(repr(hub.bluetooth.discoverable(30)))",
                "print(repr(hub.bluetooth.info()))",
                "print(repr(hub.bluetooth.forget('A0:E6:F8:1E:13:45')))",
                "print(repr(hub.bluetooth.lwp_bypass(True)))",
            ]
        );
    }

    #[tokio::test]
    async fn test_buttons() {
        let (hub, mock) = hub_with(&["False\r\n", "3\r\n"]);
        let buttons = hub.button();
        assert!(!assert_ok!(buttons.left().is_pressed().await));
        assert_eq!(assert_ok!(buttons.connect().presses().await), 3);
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.button.left.is_pressed()))",
                "print(repr(hub.button.connect.presses()))",
            ]
        );
    }

    #[tokio::test]
    async fn test_display_set_pixel() {
        let (hub, mock) = hub_with(&["None"]);
        assert_ok!(hub.display().set_pixel(2, 3, 9).await);
        assert_eq!(mock.requests(), ["print(repr(hub.display.pixel(2, 3, 9)))"]);
    }

    #[tokio::test]
    async fn test_display_calls() {
        let (hub, mock) = hub_with(&["None\r\n", "5\r\n", "2\r\n", "None\r\n", "None\r\n"]);
        let display = hub.display();
        assert_ok!(display.rotation(90).await);
        assert_eq!(assert_ok!(display.pixel(0, 4).await), 5);
        assert_eq!(assert_ok!(display.align().await), Face::Right);
        assert_ok!(display.set_align(Face::Left).await);
        assert_ok!(display.clear().await);
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.display.rotation(90)))",
                "print(repr(hub.display.pixel(0, 4)))",
                "print(repr(hub.display.align()))",
                "print(repr(hub.display.align(5)))",
                "print(repr(hub.display.clear()))",
            ]
        );
    }

    #[tokio::test]
    async fn test_display_show_images() {
        let (hub, mock) = hub_with(&["None\r\n", "None\r\n"]);
        let display = hub.display();
        let heart = assert_ok!(Image::parse(icons::HEART));
        let small = assert_ok!(Image::parse(icons::HEART_SMALL));

        assert_ok!(display.show(&heart).await);
        assert_ok!(
            display
                .show_sequence(
                    &[heart, small],
                    ShowOptions {
                        delay: Some(200),
                        looping: Some(true),
                        ..ShowOptions::default()
                    }
                )
                .await
        );
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.display.show(Image('09090:99999:99999:09990:00900:'))))",
                "print(repr(hub.display.show([Image('09090:99999:99999:09990:00900:'), \
                 Image('00000:09090:09990:00900:00000:')], delay=200, loop=True)))",
            ]
        );
    }

    #[tokio::test]
    async fn test_motion() {
        let (hub, mock) = hub_with(&[
            "(0, -2, 981)\r\n",
            "0\r\n",
            "None\r\n",
            "None\r\n",
            "None\r\n",
            "1\r\n",
        ]);
        let motion = hub.motion();
        assert_eq!(assert_ok!(motion.accelerometer(true).await), (0, -2, 981));
        assert_eq!(assert_ok!(motion.orientation().await), Face::Top);
        assert_eq!(assert_ok!(motion.gesture().await), None);
        assert_ok!(motion.preset_yaw(0).await);
        assert_ok!(motion.set_yaw_correction(-0.5).await);
        assert_eq!(assert_ok!(motion.gesture().await), Some(Gesture::DoubleTapped));
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.motion.accelerometer(True)))",
                "print(repr(hub.motion.orientation()))",
                "print(repr(hub.motion.gesture()))",
                "print(repr(hub.motion.yaw_pitch_roll(0)))",
                "print(repr(hub.motion.yaw_pitch_roll(yaw_correction=-0.5)))",
                "print(repr(hub.motion.gesture()))",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_face_is_rejected() {
        let (hub, _mock) = hub_with(&["9\r\n"]);
        let err = assert_err!(hub.motion().orientation().await);
        assert!(matches!(err, HubError::UnexpectedReply { .. }));
    }

    #[tokio::test]
    async fn test_sound() {
        let (hub, mock) = hub_with(&["None\r\n", "None\r\n", "7\r\n"]);
        let sound = hub.sound();
        assert_ok!(sound.beep(440, 500, Waveform::Square).await);
        assert_ok!(sound.play("/sounds/startup", 16000).await);
        assert_eq!(assert_ok!(sound.volume().await), 7);
        assert_eq!(
            mock.requests(),
            [
                "print(repr(hub.sound.beep(440, 500, 1)))",
                "print(repr(hub.sound.play('/sounds/startup', 16000)))",
                "print(repr(hub.sound.volume()))",
            ]
        );
    }

    #[tokio::test]
    async fn test_os() {
        let (hub, mock) = hub_with(&[
            "['projects', 'runtime', 'sounds']\r\n",
            "'/'\r\n",
            "('LEGO Technic Large Hub', 'LEGO Technic Large Hub', '1.14.0', 'v1.14', 'LEGO')\r\n",
            "None\r\n",
        ]);
        let os = hub.os();
        assert_eq!(
            assert_ok!(os.listdir(None).await),
            ["projects", "runtime", "sounds"]
        );
        assert_eq!(assert_ok!(os.getcwd().await), super::Os::SEP);
        let uname = assert_ok!(os.uname().await);
        assert_eq!(uname.len(), 5);
        assert_ok!(os.rename("a.py", "b.py").await);
        assert_eq!(
            mock.requests(),
            [
                "print(repr(os.listdir()))",
                "print(repr(os.getcwd()))",
                "print(repr(tuple(os.uname())))",
                "print(repr(os.rename('a.py', 'b.py')))",
            ]
        );
    }

    #[tokio::test]
    async fn test_os_error_surfaces() {
        let mock = MockTransport::new();
        mock.push_exception("Traceback (most recent call last):\r\nOSError: [Errno 2] ENOENT\r\n");
        let hub = Hub::from_transport(mock.clone());
        let err = assert_err!(hub.os().remove("missing.py").await);
        assert!(err.to_string().contains("ENOENT"));
        assert_eq!(mock.requests(), ["print(repr(os.remove('missing.py')))"]);
    }
}
