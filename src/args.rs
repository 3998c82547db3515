use std::env;

use android_adb_pilot::Area;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Devices,
    Screenshot,
    /// Print the mean color of an area, for writing element definitions
    Sample(Area),
}

#[derive(Debug)]
pub struct Args {
    pub mode: Mode,
    pub device: Option<String>,
    pub debug_mode: bool,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut mode: Option<Mode> = None;
        let mut device: Option<String> = None;
        let mut debug_mode: bool = false;

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!("Android ADB Pilot v{}", env!("CARGO_PKG_VERSION"));
                return None;
            } else if arg == "--debug" {
                debug_mode = true;
            } else if arg == "--screenshot" || arg == "-s" {
                mode = Some(Mode::Screenshot);
            } else if let Some(val) = arg.strip_prefix("--sample=") {
                match parse_area(val) {
                    Some(area) => mode = Some(Mode::Sample(area)),
                    None => {
                        eprintln!("❌ Invalid area '{}', expected x1,y1,x2,y2", val);
                        return None;
                    }
                }
            } else if let Some(val) = arg.strip_prefix("--device=") {
                device = Some(val.to_string());
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(Args {
            mode: mode.unwrap_or(Mode::Devices),
            device,
            debug_mode,
        })
    }
}

fn parse_area(val: &str) -> Option<Area> {
    let parts: Vec<i32> = val
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts[..] {
        [x1, y1, x2, y2] if x2 > x1 && y2 > y1 => Some(Area::new(x1, y1, x2, y2)),
        _ => None,
    }
}

fn print_help() {
    println!("🤖 Android ADB Pilot");
    println!();
    println!("USAGE:");
    println!("    android-adb-pilot [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)              List devices attached to the ADB server");
    println!("    --screenshot, -s        Take a screenshot and save to file (cli-screenshot.png)");
    println!("    --sample=x1,y1,x2,y2    Print the mean color of an area of the current screen");
    println!("    --device=NAME           Use this device instead of the only attached one");
    println!("    --debug                 Enable debug logging");
    println!("    --help, -h              Show this help message");
    println!("    --version, -v           Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    android-adb-pilot --screenshot");
    println!("    android-adb-pilot --sample=330,200,355,465 --device=emulator-5554");
    println!("    android-adb-pilot --debug");
}
