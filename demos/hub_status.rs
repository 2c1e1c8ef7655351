use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};
use hubrepl::{icons, BatteryStatus, Hub, Image, Literal, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("📊 hubrepl Status Example");
    info!("Searching for a hub on the USB serial ports...");

    let hub = match Hub::connect_first().await {
        Ok(hub) => {
            if let Some(device) = hub.device_info() {
                info!("✅ Connected to hub at {}", device.path);
            }
            hub
        }
        Err(e) => {
            error!("❌ Failed to connect to hub: {}", e);
            return Err(e);
        }
    };

    info!("Firmware: {}", hub.version().await?);
    let uname = hub.os().uname().await?;
    info!("System: {}", uname.join(" "));

    hub.display().show(&Image::parse(icons::HAPPY)?).await?;

    let battery = hub.battery();
    let motion = hub.motion();
    let mut ticker = interval(Duration::from_secs(2));

    for _ in 0..5 {
        ticker.tick().await;

        let voltage = battery.voltage().await?;
        let capacity = battery.capacity_left().await?;
        let info = battery.info().await?;
        let error_state = info
            .get("error_state")
            .and_then(Literal::as_i64)
            .map_or(BatteryStatus::NoError, BatteryStatus::from);
        let (yaw, pitch, roll) = motion.yaw_pitch_roll().await?;

        println!("\n📊 Hub Status");
        println!("┌─────────────────────────────────────────┐");
        println!("│ Battery: {voltage:5} mV ({capacity:3}%)              │");
        println!("│ Battery state: {:24} │", error_state.to_string());
        println!("│ Temperature: {:6.1}°C                   │", hub.temperature().await?);
        println!("│ Orientation: {:26} │", motion.orientation().await?.to_string());
        println!("│ Yaw/pitch/roll: {yaw:4} {pitch:4} {roll:4}         │");
        println!("└─────────────────────────────────────────┘");

        if error_state != BatteryStatus::NoError {
            warn!("⚠️  Battery reports: {}", error_state);
        }
        if let Some(charger) = battery.charger_detect().await? {
            info!("🔌 Charger: {}", charger);
        }
    }

    hub.display().clear().await?;
    hub.close().await?;
    info!("👋 Done");
    Ok(())
}
