// https://crates.io/crates/adb_client
use adb_client::{ADBDeviceExt, ADBServer, ADBServerDevice, RustADBError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::error::{AdbError, AdbResult};
use crate::display::{DisplayChannel, Frame};
use crate::error::{AutomationError, AutomationResult};
use crate::match_image::Point;

const SHELL_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// A device as listed by the ADB server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
}

/// `DisplayChannel` backed by a device of the local ADB server.
///
/// `adb_client` is blocking, so every shell call runs on the blocking pool
/// under a timeout; a stuck device surfaces as `AdbError::Timeout`.
pub struct AdbChannel {
    device: Device,
    server_device: Arc<Mutex<ADBServerDevice>>,
    screen_x: u32,
    screen_y: u32,
}

impl AdbChannel {
    pub async fn list_devices() -> AdbResult<Vec<Device>> {
        let mut server = ADBServer::default();
        let devices = tokio::task::spawn_blocking(move || server.devices()).await??;
        Ok(devices
            .into_iter()
            .map(|d| Device { name: d.identifier })
            .collect())
    }

    /// Open `device_name`, or the only attached device when `None`.
    pub async fn connect(device_name: Option<&str>) -> AdbResult<Self> {
        let name = device_name.map(str::to_string);
        let label = name.clone().unwrap_or_else(|| "default".to_string());
        let mut server = ADBServer::default();
        let server_device = tokio::task::spawn_blocking(move || match name {
            Some(name) => server.get_device_by_name(&name),
            None => server.get_device(),
        })
        .await?
        .map_err(|source| AdbError::ConnectionFailed {
            device: label.clone(),
            source,
        })?;

        let mut channel = AdbChannel {
            device: Device { name: label },
            server_device: Arc::new(Mutex::new(server_device)),
            screen_x: 0,
            screen_y: 0,
        };
        let output = channel.shell(&["wm", "size"], SHELL_TIMEOUT).await?;
        let (x, y) = parse_screen_size(&String::from_utf8_lossy(&output))
            .ok_or(AdbError::ScreenSizeParseFailed)?;
        channel.screen_x = x;
        channel.screen_y = y;
        log::info!("📱 Connected to {} ({}x{})", channel.device.name, x, y);
        Ok(channel)
    }

    pub async fn connect_first() -> AdbResult<Self> {
        let first = Self::list_devices()
            .await?
            .into_iter()
            .next()
            .ok_or(AdbError::NoDevice)?;
        Self::connect(Some(&first.name)).await
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn screen_dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    /// Run a shell command on the blocking pool, bounded by `timeout`.
    async fn shell(&self, command: &[&str], timeout: Duration) -> AdbResult<Vec<u8>> {
        let server_device = Arc::clone(&self.server_device);
        let parts: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        let joined = parts.join(" ");
        let task = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, RustADBError> {
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            let mut out: Vec<u8> = Vec::new();
            let mut dev = server_device.blocking_lock();
            dev.shell_command(&refs, &mut out)?;
            Ok(out)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined_result) => joined_result?.map_err(|source| AdbError::ShellCommandFailed {
                command: joined,
                source,
            }),
            Err(_) => Err(AdbError::Timeout {
                duration: timeout,
                description: format!(
                    "'{}' on {} (device may be disconnected)",
                    joined, self.device.name
                ),
            }),
        }
    }

    /// PNG bytes of the current screen.
    pub async fn screencap_png(&self) -> AdbResult<Vec<u8>> {
        let start = Instant::now();
        let bytes = self.shell(&["screencap", "-p"], CAPTURE_TIMEOUT).await?;
        log::debug!("Screencap {} bytes in {}ms", bytes.len(), start.elapsed().as_millis());
        Ok(bytes)
    }

    fn check_bounds(&self, point: Point) -> AdbResult<()> {
        check_bounds(point, self.screen_dimensions())
    }
}

/// Valid coordinates run from 0 to one less than the screen size.
pub(crate) fn check_bounds(point: Point, (width, height): (u32, u32)) -> AdbResult<()> {
    if point.x < 0 || point.y < 0 || point.x as u32 >= width || point.y as u32 >= height {
        return Err(AdbError::OutOfBounds { x: point.x, y: point.y });
    }
    Ok(())
}

/// Reads `Physical size: WxH`, preferring an `Override size` line when present.
pub(crate) fn parse_screen_size(output: &str) -> Option<(u32, u32)> {
    let parse = |prefix: &str| {
        output.lines().find_map(|line| {
            let (w, h) = line.trim().strip_prefix(prefix)?.trim().split_once('x')?;
            Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?))
        })
    };
    parse("Override size:").or_else(|| parse("Physical size:"))
}

pub(crate) fn decode_screencap(bytes: &[u8]) -> AdbResult<Frame> {
    // Some devices print a warning line before the PNG signature
    let start = bytes
        .windows(8)
        .position(|w| w == b"\x89PNG\r\n\x1a\n")
        .unwrap_or(0);
    image::load_from_memory(&bytes[start..])
        .map(|img| img.to_rgb8())
        .map_err(|e| AdbError::ScreencapDecodeFailed { description: e.to_string() })
}

fn capture_error(e: AdbError) -> AutomationError {
    if e.is_disconnect() {
        log::warn!("🔌 {}", e);
    }
    AutomationError::Capture { description: e.to_string() }
}

fn input_error(e: AdbError) -> AutomationError {
    AutomationError::Input { description: e.to_string() }
}

impl DisplayChannel for AdbChannel {
    async fn capture_frame(&mut self) -> AutomationResult<Frame> {
        let bytes = self.screencap_png().await.map_err(capture_error)?;
        decode_screencap(&bytes).map_err(capture_error)
    }

    async fn tap(&mut self, point: Point) -> AutomationResult<()> {
        self.check_bounds(point).map_err(input_error)?;
        let (x, y) = (point.x.to_string(), point.y.to_string());
        self.shell(&["input", "tap", &x, &y], SHELL_TIMEOUT)
            .await
            .map_err(input_error)?;
        Ok(())
    }

    async fn swipe(&mut self, from: Point, to: Point, duration: Duration) -> AutomationResult<()> {
        self.check_bounds(from).map_err(input_error)?;
        self.check_bounds(to).map_err(input_error)?;
        let args = [from.x, from.y, to.x, to.y].map(|v| v.to_string());
        let millis = duration.as_millis().to_string();
        let [x1, y1, x2, y2] = &args;
        let command: [&str; 7] = ["input", "swipe", x1, y1, x2, y2, &millis];
        // The swipe itself blocks the shell for its whole duration
        self.shell(&command, SHELL_TIMEOUT + duration)
            .await
            .map_err(input_error)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.device.name
    }
}
