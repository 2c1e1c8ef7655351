use bytes::Bytes;
use std::fmt;

use crate::{
    error::{HubError, Result},
    literal::Literal,
};

/// Prefix the firmware prints for a constructed motor pair object
pub const MOTOR_PAIR_REPR_PREFIX: &str = "MotorPair(";

/// Name of an object in the hub interpreter's namespace
///
/// Either a dotted path from a module (`hub.port.A.motor`) or a bare variable name bound by
/// this library (`pairAB`). Two handles address the same remote object iff their strings
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteHandle(String);

impl RemoteHandle {
    /// Create a handle from a path or bound name
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Handle for an attribute of this object
    #[must_use]
    pub fn child(&self, attribute: &str) -> Self {
        Self(format!("{}.{attribute}", self.0))
    }

    /// The path string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for a bare variable name rather than a dotted path
    #[must_use]
    pub fn is_bound_name(&self) -> bool {
        !self.0.contains('.')
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote method call under construction
///
/// Arguments are rendered as they are added; keyword arguments always follow positional ones
/// in the built expression, each in the order given.
///
/// ```
/// use hubrepl::protocol::{Call, RemoteHandle};
///
/// let motor = RemoteHandle::new("hub.port.A.motor");
/// let call = Call::method(&motor, "run_for_degrees")
///     .arg(360)
///     .kwarg("speed", 50)
///     .kwarg("stall", true);
/// assert_eq!(
///     call.build().unwrap(),
///     "hub.port.A.motor.run_for_degrees(360, speed=50, stall=True)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    target: String,
    args: Vec<String>,
    kwargs: Vec<(String, String)>,
}

impl Call {
    /// Call `method` on the object behind `handle`
    #[must_use]
    pub fn method(handle: &RemoteHandle, method: &str) -> Self {
        Self {
            target: format!("{handle}.{method}"),
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    /// Append a positional argument
    #[must_use]
    pub fn arg(mut self, value: impl Into<Literal>) -> Self {
        self.args.push(value.into().to_string());
        self
    }

    /// Append a positional argument that names another remote object
    #[must_use]
    pub fn handle_arg(mut self, handle: &RemoteHandle) -> Self {
        self.args.push(handle.to_string());
        self
    }

    /// Append a keyword argument
    #[must_use]
    pub fn kwarg(mut self, name: &str, value: impl Into<Literal>) -> Self {
        self.kwargs
            .push((name.to_string(), value.into().to_string()));
        self
    }

    /// Append a keyword argument only when a value is given
    #[must_use]
    pub fn kwarg_opt<T: Into<Literal>>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.kwarg(name, value),
            None => self,
        }
    }

    /// Positional argument given as an expression built inside this crate
    pub(crate) fn expr_arg(mut self, expression: String) -> Self {
        self.args.push(expression);
        self
    }

    /// Render the call expression
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidArgument`] if a keyword name is not an identifier.
    pub fn build(&self) -> Result<String> {
        if let Some((name, _)) = self.kwargs.iter().find(|(name, _)| !is_identifier(name)) {
            return Err(HubError::InvalidArgument(format!(
                "keyword name {name:?} is not an identifier"
            )));
        }
        let parts: Vec<String> = self
            .args
            .iter()
            .cloned()
            .chain(self.kwargs.iter().map(|(k, v)| format!("{k}={v}")))
            .collect();
        Ok(format!("{}({})", self.target, parts.join(", ")))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Source text that makes the hub print the literal form of `expression`
#[must_use]
pub fn eval_request(expression: &str) -> String {
    format!("print(repr({expression}))")
}

/// Decode the printed reply of an [`eval_request`]
///
/// # Errors
///
/// Returns [`HubError::RemoteEvaluation`] carrying the raw reply if it is not UTF-8 or not a
/// single literal.
pub fn decode_reply(reply: &Bytes) -> Result<Literal> {
    let text = std::str::from_utf8(reply)
        .map_err(|e| HubError::remote(format!("reply is not UTF-8: {e}"), reply.clone()))?;
    Literal::parse(text)
        .map_err(|e| HubError::remote(format!("reply is not a literal: {e}"), reply.clone()))
}

/// Source text that pairs two motors, binds the pair to `name` and prints it
#[must_use]
pub fn pair_request(name: &str, primary: &RemoteHandle, secondary: &RemoteHandle) -> String {
    format!("{name} = {primary}.pair({secondary}); print({name})")
}

/// What the firmware answered to a [`pair_request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairReply {
    /// A pair object was created and bound
    Created,
    /// `False`: the motors are of incompatible types
    Incompatible,
    /// `None`: pairing failed for another reason
    Failed,
}

/// Classify the printed reply of a [`pair_request`]
///
/// # Errors
///
/// Returns [`HubError::Protocol`] if the reply is none of the three known outcomes.
pub fn classify_pair_reply(reply: &[u8]) -> Result<PairReply> {
    let text = String::from_utf8_lossy(reply);
    match text.trim() {
        "False" => Ok(PairReply::Incompatible),
        "None" => Ok(PairReply::Failed),
        t if t.starts_with(MOTOR_PAIR_REPR_PREFIX) => Ok(PairReply::Created),
        t => Err(HubError::Protocol(format!("Unexpected MotorPair reply: {t:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_handle_paths() {
        let port = RemoteHandle::new("hub.port").child("A");
        assert_eq!(port.as_str(), "hub.port.A");
        assert_eq!(port.child("motor"), RemoteHandle::new("hub.port.A.motor"));
        assert!(!port.is_bound_name());
        assert!(RemoteHandle::new("pairAB").is_bound_name());
    }

    #[test]
    fn test_build_call_order() {
        let display = RemoteHandle::new("hub.display");
        let call = Call::method(&display, "pixel").arg(2).arg(3).arg(9);
        assert_eq!(call.build().unwrap(), "hub.display.pixel(2, 3, 9)");

        // Keyword arguments land after positional ones regardless of insertion order
        let call = Call::method(&display, "show")
            .kwarg("delay", 400)
            .arg("hi")
            .kwarg("loop", false);
        assert_eq!(
            call.build().unwrap(),
            "hub.display.show('hi', delay=400, loop=False)"
        );

        let empty = Call::method(&RemoteHandle::new("hub.battery"), "voltage");
        assert_eq!(empty.build().unwrap(), "hub.battery.voltage()");
    }

    #[test]
    fn test_build_nested_arguments() {
        let motor = RemoteHandle::new("hub.port.C.motor");
        let call = Call::method(&motor, "mode")
            .arg(vec![(1, 0), (2, 0), (3, 0), (0, 0)]);
        assert_eq!(
            call.build().unwrap(),
            "hub.port.C.motor.mode([(1, 0), (2, 0), (3, 0), (0, 0)])"
        );

        let device = RemoteHandle::new("hub.port.D.device");
        let call = Call::method(&device, "write_direct").arg(&b"\x01\xff'"[..]);
        assert_eq!(
            call.build().unwrap(),
            "hub.port.D.device.write_direct(b\"\\x01\\xff'\")"
        );
    }

    #[test]
    fn test_kwarg_opt_and_validation() {
        let motor = RemoteHandle::new("hub.port.A.motor");
        let call = Call::method(&motor, "run_at_speed")
            .arg(50)
            .kwarg_opt("max_power", None::<i64>)
            .kwarg_opt("acceleration", Some(100));
        assert_eq!(
            call.build().unwrap(),
            "hub.port.A.motor.run_at_speed(50, acceleration=100)"
        );

        let bad = Call::method(&motor, "run_at_speed").kwarg("x); import os; (", 1);
        let err = assert_err!(bad.build());
        assert!(matches!(err, HubError::InvalidArgument(_)));
        assert_err!(Call::method(&motor, "pid").kwarg("1p", 1).build());
        assert_ok!(Call::method(&motor, "pid").kwarg("_p1", 1).build());
    }

    #[test]
    fn test_handle_argument() {
        let a = RemoteHandle::new("hub.port.A.motor");
        let b = RemoteHandle::new("hub.port.B.motor");
        let call = Call::method(&a, "pair").handle_arg(&b);
        assert_eq!(call.build().unwrap(), "hub.port.A.motor.pair(hub.port.B.motor)");
    }

    #[test]
    fn test_eval_request_and_decode() {
        assert_eq!(
            eval_request("hub.battery.voltage()"),
            "print(repr(hub.battery.voltage()))"
        );
        let value = decode_reply(&Bytes::from_static(b"8294\r\n")).unwrap();
        assert_eq!(value, Literal::Int(8294));

        let err = decode_reply(&Bytes::from_static(b"<object at 0x2000>")).unwrap_err();
        assert!(err.is_remote_error());
        assert_eq!(err.reply().map(|b| &b[..]), Some(&b"<object at 0x2000>"[..]));

        let err = decode_reply(&Bytes::from_static(b"\xff\xfe")).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_pair_request() {
        let a = RemoteHandle::new("hub.port.A.motor");
        let b = RemoteHandle::new("hub.port.B.motor");
        assert_eq!(
            pair_request("pairAB", &a, &b),
            "pairAB = hub.port.A.motor.pair(hub.port.B.motor); print(pairAB)"
        );
    }

    #[test]
    fn test_classify_pair_reply() {
        assert_eq!(classify_pair_reply(b"False").unwrap(), PairReply::Incompatible);
        assert_eq!(classify_pair_reply(b"None\r\n").unwrap(), PairReply::Failed);
        assert_eq!(
            classify_pair_reply(b"MotorPair(hub.port.A, hub.port.B)\r\n").unwrap(),
            PairReply::Created
        );
        let err = classify_pair_reply(b"True").unwrap_err();
        assert!(matches!(err, HubError::Protocol(_)));
    }
}
