use tracing::{error, info, warn};
use hubrepl::{
    ConnectionParams, Hub, PairOutcome, PairRunOptions, Result, RunOptions, StopAction,
    TimeoutConfig, Waveform,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🚗 hubrepl Motor Pair Example");

    // Pass a port path as the first argument to skip discovery
    let params = ConnectionParams {
        device: std::env::args().nth(1),
        ..ConnectionParams::default()
    };
    let timeouts = TimeoutConfig {
        command_timeout_ms: 60_000,
        ..TimeoutConfig::default()
    };

    let hub = Hub::connect_with_params_and_timeout(params, timeouts).await?;
    hub.sound().beep(880, 200, Waveform::Sine).await?;

    let left = hub.port().a().motor();
    let right = hub.port().b().motor();

    left.run_for_degrees(
        90,
        RunOptions {
            speed: Some(30),
            stop: Some(StopAction::Hold),
            ..RunOptions::default()
        },
    )
    .await?;

    let pair = match left.pair(&right).await? {
        PairOutcome::Paired(pair) => pair,
        PairOutcome::Incompatible => {
            warn!("Motors on A and B are of different types");
            return hub.close().await;
        }
        PairOutcome::Failed => {
            error!("❌ Could not pair the motors on A and B");
            return hub.close().await;
        }
    };
    info!("✅ Paired as {} (id {})", pair.name(), pair.id().await?);

    info!("Driving forward");
    pair.run_for_time(
        2000,
        PairRunOptions {
            speed_0: Some(50),
            speed_1: Some(-50),
            stop: Some(StopAction::Brake),
            ..PairRunOptions::default()
        },
    )
    .await?;

    info!("Turning in place");
    pair.run_for_degrees(
        360,
        PairRunOptions {
            speed_0: Some(40),
            speed_1: Some(40),
            ..PairRunOptions::default()
        },
    )
    .await?;

    pair.brake().await?;
    if pair.unpair().await? {
        info!("Unpaired {}", pair.name());
    } else {
        warn!("Hub kept {} paired", pair.name());
    }

    hub.close().await?;
    info!("👋 Done");
    Ok(())
}
