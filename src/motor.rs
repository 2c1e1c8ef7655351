use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, info, warn};

use crate::{
    error::{HubError, Result},
    hub::{Node, Session},
    literal::Literal,
    protocol::{classify_pair_reply, pair_request, Call, PairReply, RemoteHandle},
    types::{BusyType, DataFormat, PortId, StopAction},
};

/// Ordered (primary, secondary) ports of a motor pair
pub(crate) type PairKey = (PortId, PortId);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Pending(String),
    Active(String),
}

impl Slot {
    fn name(&self) -> &str {
        match self {
            Self::Pending(name) | Self::Active(name) => name,
        }
    }
}

/// Bound names of the motor pairs of one connection
///
/// A name is handed out for an ordered port pair only while no other pair on those ports is
/// live or being created. The first pair on `A`/`B` is `pairAB`; later ones are `pairAB_2`,
/// `pairAB_3` and so on, so a name never refers to two different remote objects.
#[derive(Debug, Default)]
pub(crate) struct PairTable {
    slots: HashMap<PairKey, Slot>,
    created: HashMap<PairKey, u32>,
}

impl PairTable {
    fn base_name((primary, secondary): PairKey) -> String {
        format!("pair{}{}", primary.letter(), secondary.letter())
    }

    /// Reserve the next name for `key`
    pub(crate) fn reserve(&mut self, key: PairKey) -> Result<String> {
        if let Some(slot) = self.slots.get(&key) {
            return Err(HubError::PairNameInUse {
                name: slot.name().to_string(),
            });
        }
        let name = match self.created.get(&key).copied().unwrap_or(0) {
            0 => Self::base_name(key),
            n => format!("{}_{}", Self::base_name(key), n + 1),
        };
        self.slots.insert(key, Slot::Pending(name.clone()));
        Ok(name)
    }

    /// The reserved name now holds a live pair
    pub(crate) fn commit(&mut self, key: PairKey) {
        if let Some(Slot::Pending(name)) = self.slots.get_mut(&key) {
            let name = std::mem::take(name);
            self.slots.insert(key, Slot::Active(name));
            *self.created.entry(key).or_insert(0) += 1;
        }
    }

    /// Drop a reservation that did not produce a pair
    pub(crate) fn abandon(&mut self, key: PairKey) {
        if matches!(self.slots.get(&key), Some(Slot::Pending(_))) {
            self.slots.remove(&key);
        }
    }

    /// Free the ports of a pair that was unpaired
    pub(crate) fn release(&mut self, key: PairKey, name: &str) {
        if self.slots.get(&key) == Some(&Slot::Active(name.to_string())) {
            self.slots.remove(&key);
        }
    }
}

/// Keyword arguments of the single-motor run commands
///
/// Unset fields use the motor's defaults (see [`Motor::set_default`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Speed as a percentage of the rated speed, sign gives the direction
    pub speed: Option<i64>,
    /// Percentage of maximum power
    pub max_power: Option<i64>,
    /// How to stop at the end; not accepted by `run_at_speed`
    pub stop: Option<StopAction>,
    /// Milliseconds (0-10000) to reach the rated speed from standstill
    pub acceleration: Option<i64>,
    /// Milliseconds (0-10000) to stop from the rated speed
    pub deceleration: Option<i64>,
    /// Give up when stalled
    pub stall: Option<bool>,
}

impl RunOptions {
    fn apply(self, call: Call) -> Call {
        call.kwarg_opt("speed", self.speed)
            .kwarg_opt("max_power", self.max_power)
            .kwarg_opt("stop", self.stop)
            .kwarg_opt("acceleration", self.acceleration)
            .kwarg_opt("deceleration", self.deceleration)
            .kwarg_opt("stall", self.stall)
    }
}

/// Keyword arguments of the motor pair run commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairRunOptions {
    /// Speed of the motor travelling farthest, used by `run_to_position`
    pub speed: Option<i64>,
    /// Speed of the primary motor
    pub speed_0: Option<i64>,
    /// Speed of the secondary motor
    pub speed_1: Option<i64>,
    /// Percentage of maximum power
    pub max_power: Option<i64>,
    /// Milliseconds (0-10000) to reach the rated speed from standstill
    pub acceleration: Option<i64>,
    /// Milliseconds (0-10000) to stop from the rated speed
    pub deceleration: Option<i64>,
    /// How to stop at the end
    pub stop: Option<StopAction>,
}

impl PairRunOptions {
    fn apply(self, call: Call) -> Call {
        call.kwarg_opt("speed", self.speed)
            .kwarg_opt("speed_0", self.speed_0)
            .kwarg_opt("speed_1", self.speed_1)
            .kwarg_opt("max_power", self.max_power)
            .kwarg_opt("acceleration", self.acceleration)
            .kwarg_opt("deceleration", self.deceleration)
            .kwarg_opt("stop", self.stop)
    }
}

/// Settings for [`Motor::set_default`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorDefaults {
    /// Default speed
    pub speed: Option<i64>,
    /// Default maximum power
    pub max_power: Option<i64>,
    /// Default acceleration time
    pub acceleration: Option<i64>,
    /// Default deceleration time
    pub deceleration: Option<i64>,
    /// Default stop action
    pub stop: Option<StopAction>,
    /// Default PID constants
    pub pid: Option<(i64, i64, i64)>,
    /// Default stall detection
    pub stall: Option<bool>,
}

/// A motor, `hub.port.X.motor`
#[derive(Debug, Clone)]
pub struct Motor {
    node: Node,
    port: PortId,
}

impl Motor {
    pub(crate) const fn new(node: Node, port: PortId) -> Self {
        Self { node, port }
    }

    /// Port the motor is attached to
    #[must_use]
    pub const fn port(&self) -> PortId {
        self.port
    }

    /// Remote handle of the motor
    #[must_use]
    pub const fn handle(&self) -> &RemoteHandle {
        &self.node.handle
    }

    /// Values selected by [`Motor::set_mode`], in the requested format
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

    /// Select which `(mode, dataset)` values [`Motor::get`] returns
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_mode(&self, modes: &[(i64, i64)]) -> Result<()> {
        let call = self.node.call("mode").arg(modes.to_vec());
        self.node.invoke_unit(call).await
    }

    /// Apply a PWM value (-100 to 100)
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn pwm(&self, value: i64) -> Result<()> {
        self.node.invoke_unit(self.node.call("pwm").arg(value)).await
    }

    /// Stop and let the motor spin freely
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn float(&self) -> Result<()> {
        self.node.invoke_unit(self.node.call("float")).await
    }

    /// Stop with passive braking
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn brake(&self) -> Result<()> {
        self.node.invoke_unit(self.node.call("brake")).await
    }

    /// Stop and actively hold the position
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn hold(&self) -> Result<()> {
        self.node.invoke_unit(self.node.call("hold")).await
    }

    /// Whether the port or motor is busy
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a bool.
    pub async fn busy(&self, busy_type: BusyType) -> Result<bool> {
        self.node
            .invoke(self.node.call("busy").arg(busy_type))
            .await
    }

    /// Start running at `speed` percent
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn run_at_speed(&self, speed: i64, options: RunOptions) -> Result<()> {
        let call = options.apply(self.node.call("run_at_speed").arg(speed));
        self.node.invoke_unit(call).await
    }

    /// Run for `msec` milliseconds
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn run_for_time(&self, msec: i64, options: RunOptions) -> Result<()> {
        let call = options.apply(self.node.call("run_for_time").arg(msec));
        self.node.invoke_unit(call).await
    }

    /// Rotate by `degrees` relative to the current position
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn run_for_degrees(&self, degrees: i64, options: RunOptions) -> Result<()> {
        let call = options.apply(self.node.call("run_for_degrees").arg(degrees));
        self.node.invoke_unit(call).await
    }

    /// Rotate to an absolute `position` in degrees
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn run_to_position(&self, position: i64, options: RunOptions) -> Result<()> {
        let call = options.apply(self.node.call("run_to_position").arg(position));
        self.node.invoke_unit(call).await
    }

    /// Redefine the current position as `position`
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn preset(&self, position: i64) -> Result<()> {
        self.node
            .invoke_unit(self.node.call("preset").arg(position))
            .await
    }

    /// PID constants previously set with [`Motor::set_pid`]; empty if none were set
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the reply is not a tuple.
    pub async fn pid(&self) -> Result<Vec<Literal>> {
        self.node.get("pid").await
    }

    /// Set the PID controller constants
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_pid(&self, p: i64, i: i64, d: i64) -> Result<()> {
        let call = self.node.call("pid").arg(p).arg(i).arg(d);
        self.node.invoke_unit(call).await
    }

    /// Current default settings as a dictionary
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn default(&self) -> Result<Literal> {
        self.node.get("default").await
    }

    /// Change the default settings used when a run command omits an option
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn set_default(&self, defaults: MotorDefaults) -> Result<()> {
        let call = self
            .node
            .call("default")
            .kwarg_opt("speed", defaults.speed)
            .kwarg_opt("max_power", defaults.max_power)
            .kwarg_opt("acceleration", defaults.acceleration)
            .kwarg_opt("deceleration", defaults.deceleration)
            .kwarg_opt("stop", defaults.stop)
            .kwarg_opt("pid", defaults.pid)
            .kwarg_opt("stall", defaults.stall);
        self.node.invoke_unit(call).await
    }

    /// Pair this motor (primary) with `other` (secondary)
    ///
    /// The pair object is created and bound to a name on the hub in a single round trip.
    /// Motors of different types give [`PairOutcome::Incompatible`]; motors that cannot be
    /// paired for another reason, for instance because one is already in a pair, give
    /// [`PairOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairNameInUse`] if these ports already form a live pair or are
    /// being paired, [`HubError::Protocol`] for an unrecognized reply, or the round trip's
    /// error.
    pub async fn pair(&self, other: &Self) -> Result<PairOutcome> {
        let key = (self.port, other.port);
        let session = &self.node.session;
        let reservation = Reservation::new(session, key)?;
        let source = pair_request(&reservation.name, &self.node.handle, &other.node.handle);

        let reply = classify_pair_reply(&session.execute(&source).await?)?;
        match reply {
            PairReply::Created => {
                let name = reservation.commit();
                info!("Paired motors on ports {} and {} as {name}", key.0, key.1);
                Ok(PairOutcome::Paired(MotorPair {
                    node: Node::new(Arc::clone(session), RemoteHandle::new(name.clone())),
                    name,
                    primary: self.clone(),
                    secondary: other.clone(),
                    released: Arc::new(AtomicBool::new(false)),
                }))
            }
            PairReply::Incompatible => {
                warn!("Motors on ports {} and {} are incompatible", key.0, key.1);
                Ok(PairOutcome::Incompatible)
            }
            PairReply::Failed => {
                warn!("Pairing motors on ports {} and {} failed", key.0, key.1);
                Ok(PairOutcome::Failed)
            }
        }
    }
}

/// A pending pair name; dropped without [`Reservation::commit`] it is abandoned
///
/// Covers every way out of [`Motor::pair`], including the caller dropping the future.
struct Reservation<'a> {
    session: &'a Session,
    key: PairKey,
    name: String,
    committed: bool,
}

impl<'a> Reservation<'a> {
    fn new(session: &'a Session, key: PairKey) -> Result<Self> {
        let name = session.pairs().reserve(key)?;
        Ok(Self {
            session,
            key,
            name,
            committed: false,
        })
    }

    fn commit(mut self) -> String {
        self.session.pairs().commit(self.key);
        self.committed = true;
        std::mem::take(&mut self.name)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.session.pairs().abandon(self.key);
        }
    }
}

/// Result of [`Motor::pair`]
#[derive(Debug, Clone)]
pub enum PairOutcome {
    /// The pair was created
    Paired(MotorPair),
    /// The motors are of different types
    Incompatible,
    /// Pairing failed for another reason
    Failed,
}

impl PairOutcome {
    /// Whether a pair was created
    #[must_use]
    pub const fn is_paired(&self) -> bool {
        matches!(self, Self::Paired(_))
    }

    /// The created pair, if any
    #[must_use]
    pub fn into_pair(self) -> Option<MotorPair> {
        match self {
            Self::Paired(pair) => Some(pair),
            _ => None,
        }
    }
}

/// Two motors driven together, bound to a variable in the hub's interpreter
///
/// Clones refer to the same remote pair. Once [`MotorPair::unpair`] succeeds every clone
/// refuses further calls with [`HubError::PairReleased`].
#[derive(Debug, Clone)]
pub struct MotorPair {
    node: Node,
    name: String,
    primary: Motor,
    secondary: Motor,
    released: Arc<AtomicBool>,
}

impl MotorPair {
    /// Variable name the pair is bound to on the hub
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first motor of the pair
    #[must_use]
    pub const fn primary(&self) -> &Motor {
        &self.primary
    }

    /// The second motor of the pair
    #[must_use]
    pub const fn secondary(&self) -> &Motor {
        &self.secondary
    }

    /// Whether the pair has been unpaired
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(HubError::PairReleased {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    async fn invoke_unit(&self, call: Call) -> Result<()> {
        self.ensure_live()?;
        self.node.invoke_unit(call).await
    }

    /// Pair id assigned by the firmware
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn id(&self) -> Result<i64> {
        self.ensure_live()?;
        self.node.get("id").await
    }

    /// Dissolve the pair on the hub
    ///
    /// Returns `true` when the hub released the pair; from then on this handle and its clones
    /// refuse further calls and the ports can be paired again under a fresh name. `false`
    /// leaves the pair usable.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn unpair(&self) -> Result<bool> {
        self.ensure_live()?;
        let released: bool = self.node.get("unpair").await?;
        if released {
            self.released.store(true, Ordering::Release);
            let key = (self.primary.port, self.secondary.port);
            self.node.session.pairs().release(key, &self.name);
            info!("Unpaired {}", self.name);
        } else {
            debug!("Hub kept {} paired", self.name);
        }
        Ok(released)
    }

    /// Let both motors spin freely
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn float(&self) -> Result<()> {
        self.invoke_unit(self.node.call("float")).await
    }

    /// Brake both motors
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn brake(&self) -> Result<()> {
        self.invoke_unit(self.node.call("brake")).await
    }

    /// Hold both motors in position
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn hold(&self) -> Result<()> {
        self.invoke_unit(self.node.call("hold")).await
    }

    /// Apply PWM values to the primary and secondary motor
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn pwm(&self, pwm_0: i64, pwm_1: i64) -> Result<()> {
        self.invoke_unit(self.node.call("pwm").arg(pwm_0).arg(pwm_1))
            .await
    }

    /// Start both motors at the given speeds
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn run_at_speed(
        &self,
        speed_0: i64,
        speed_1: i64,
        options: PairRunOptions,
    ) -> Result<()> {
        let call = self.node.call("run_at_speed").arg(speed_0).arg(speed_1);
        self.invoke_unit(options.apply(call)).await
    }

    /// Run both motors for `msec` milliseconds
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn run_for_time(&self, msec: i64, options: PairRunOptions) -> Result<()> {
        let call = self.node.call("run_for_time").arg(msec);
        self.invoke_unit(options.apply(call)).await
    }

    /// Rotate both motors by `degrees` on average
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn run_for_degrees(&self, degrees: i64, options: PairRunOptions) -> Result<()> {
        let call = self.node.call("run_for_degrees").arg(degrees);
        self.invoke_unit(options.apply(call)).await
    }

    /// Drive both motors to absolute positions
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn run_to_position(
        &self,
        position_0: i64,
        position_1: i64,
        options: PairRunOptions,
    ) -> Result<()> {
        let call = self
            .node
            .call("run_to_position")
            .arg(position_0)
            .arg(position_1);
        self.invoke_unit(options.apply(call)).await
    }

    /// Redefine the current positions of both motors
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn preset(&self, position_0: i64, position_1: i64) -> Result<()> {
        let call = self.node.call("preset").arg(position_0).arg(position_1);
        self.invoke_unit(call).await
    }

    /// Set the PID constants of both motor controllers
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PairReleased`] after an unpair, or the round trip's error.
    pub async fn pid(&self, p: i64, i: i64, d: i64) -> Result<()> {
        self.invoke_unit(self.node.call("pid").arg(p).arg(i).arg(d))
            .await
    }
}
