mod args;

use android_adb_pilot::match_image::color::mean_color;
use android_adb_pilot::{AdbChannel, AutomationResult, DisplayChannel};
use args::{Args, Mode};
use std::time::Instant;

fn main() {
    let Some(args) = Args::parse() else {
        return;
    };

    let level = if args.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            println!("❌ Failed to start runtime: {e}");
            return;
        }
    };
    if let Err(e) = rt.block_on(run(args)) {
        println!("❌ {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AutomationResult<()> {
    match args.mode {
        Mode::Devices => {
            let devices = AdbChannel::list_devices().await?;
            if devices.is_empty() {
                println!("❌ No devices found");
            }
            for device in devices {
                println!("📱 {}", device.name);
            }
        }
        Mode::Screenshot => {
            let mut channel = AdbChannel::connect(args.device.as_deref()).await?;
            let (sx, sy) = channel.screen_dimensions();
            println!("📱 Device: {} size: {}x{}", channel.name(), sx, sy);
            let start = Instant::now();
            let frame = channel.capture_frame().await?;
            frame.save("cli-screenshot.png")?;
            println!(
                "✅ Screenshot ({}ms) saved to cli-screenshot.png",
                start.elapsed().as_millis()
            );
        }
        Mode::Sample(area) => {
            let mut channel = AdbChannel::connect(args.device.as_deref()).await?;
            let frame = channel.capture_frame().await?;
            let color = mean_color(&frame, area);
            println!(
                "🎨 ({}, {}, {}, {}) mean color: ({}, {}, {})",
                area.x1, area.y1, area.x2, area.y2, color[0], color[1], color[2]
            );
        }
    }
    Ok(())
}
