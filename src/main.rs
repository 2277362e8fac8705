//! # Fichero CLI
//!
//! Command-line interface for Fichero / D11s label printers.
//!
//! ## Usage
//!
//! ```bash
//! # Show device info (scans for the printer over BLE)
//! fichero info
//!
//! # Print a text label on a 30mm label
//! fichero text "Hello World" --label-length 30
//!
//! # Print a photo, two copies
//! fichero image photo.jpg --copies 2
//!
//! # Preview the raster instead of printing
//! fichero image photo.jpg --png preview.png
//!
//! # Use Classic Bluetooth (Linux)
//! FICHERO_ADDR=AA:BB:CC:DD:EE:FF fichero --classic status
//!
//! # Change settings
//! fichero set density 1
//! fichero set shutdown 30
//! fichero set paper continuous
//! ```
//!
//! Logging goes to stderr at `info`; set `RUST_LOG=debug` to see raw
//! command and reply bytes.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::warn;

use fichero::{
    FicheroError,
    error::Result,
    printer::{PrintJob, Printer, PrinterConfig, client::MAX_SHUTDOWN_MINUTES},
    protocol::{
        graphics::{Density, PaperType},
        info::DeviceInfo,
    },
    render::{self, Raster, text},
    transport::{Link, rfcomm::DEFAULT_CHANNEL},
};

/// Fichero - Thermal label printer utility
#[derive(Parser, Debug)]
#[command(name = "fichero")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer address (skips BLE scanning; required with --classic)
    #[arg(long, global = true, env = "FICHERO_ADDR")]
    address: Option<String>,

    /// Use Classic Bluetooth (RFCOMM) instead of BLE, Linux only
    /// (or set FICHERO_TRANSPORT=classic)
    #[arg(long, global = true)]
    classic: bool,

    /// RFCOMM channel (only used with --classic)
    #[arg(long, global = true, default_value_t = DEFAULT_CHANNEL)]
    channel: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show device info
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show detailed status
    Status,

    /// Print a text label
    Text {
        /// Text to print
        #[arg(required = true)]
        text: Vec<String>,

        /// Glyph height in dots
        #[arg(long, default_value_t = 30)]
        font_size: u32,

        #[command(flatten)]
        print: PrintArgs,
    },

    /// Print an image file
    Image {
        /// Path to image file
        path: PathBuf,

        /// Disable Floyd-Steinberg dithering (use simple threshold)
        #[arg(long)]
        no_dither: bool,

        #[command(flatten)]
        print: PrintArgs,
    },

    /// Change printer settings
    Set {
        /// Setting to change
        setting: Setting,

        /// New value
        value: String,
    },
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// Print density: 0=light, 1=medium, 2=thick
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=2))]
    density: u8,

    /// Number of copies
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    copies: u16,

    /// Label length in mm (overrides --label-height)
    #[arg(long)]
    label_length: Option<u16>,

    /// Label height in dots
    #[arg(long, default_value_t = 240)]
    label_height: u16,

    /// Paper type: gap, black, continuous (or 0-2)
    #[arg(long, default_value = "gap")]
    paper: PaperType,

    /// Output to PNG file instead of printing
    #[arg(long, value_name = "FILE")]
    png: Option<PathBuf>,
}

impl PrintArgs {
    fn label_rows(&self) -> Result<u16> {
        match self.label_length {
            Some(mm) => PrinterConfig::D11S.mm_to_rows(mm).ok_or_else(|| {
                FicheroError::InvalidCommand(format!("label length {}mm is too long", mm))
            }),
            None => Ok(self.label_height),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Setting {
    Density,
    Shutdown,
    Paper,
}

/// A validated `set` request.
#[derive(Debug, Clone, Copy)]
enum SettingValue {
    Density(Density),
    Shutdown(u16),
    Paper(PaperType),
}

fn parse_setting(setting: Setting, value: &str) -> Result<SettingValue> {
    let invalid = |msg: &str| FicheroError::InvalidCommand(msg.to_string());
    match setting {
        Setting::Density => value
            .parse::<u8>()
            .ok()
            .and_then(|level| Density::try_from(level).ok())
            .map(SettingValue::Density)
            .ok_or_else(|| invalid("density must be 0, 1, or 2")),
        Setting::Shutdown => value
            .parse::<u16>()
            .ok()
            .filter(|minutes| (1..=MAX_SHUTDOWN_MINUTES).contains(minutes))
            .map(SettingValue::Shutdown)
            .ok_or_else(|| invalid("shutdown must be 1-480 minutes")),
        Setting::Paper => value
            .parse::<PaperType>()
            .map(SettingValue::Paper)
            .map_err(|_| invalid("paper must be gap, black, continuous, or 0-2")),
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let classic = cli.classic
        || std::env::var("FICHERO_TRANSPORT").is_ok_and(|v| v.eq_ignore_ascii_case("classic"));
    let link = if classic {
        Link::classic(cli.address.clone(), cli.channel)?
    } else {
        Link::Ble {
            address: cli.address.clone(),
        }
    };

    match cli.command {
        Commands::Info { json } => {
            with_printer(&link, |printer| async move {
                let info = printer.get_info().await?;
                let all = printer.get_all_info().await?;
                if json {
                    let doc = serde_json::json!({ "info": info, "device": all });
                    let text = serde_json::to_string_pretty(&doc).map_err(std::io::Error::other)?;
                    println!("{}", text);
                    return Ok(());
                }
                println!("  model: {}", info.model);
                println!("  firmware: {}", info.firmware);
                println!("  boot: {}", info.boot);
                println!("  serial: {}", info.serial);
                match info.battery {
                    Some(b) if b.charging => println!("  battery: {}% (charging)", b.percent),
                    Some(b) => println!("  battery: {}%", b.percent),
                    None => println!("  battery: ?"),
                }
                println!("  status: {}", info.status);
                match info.shutdown_minutes {
                    Some(m) => println!("  shutdown: {} min", m),
                    None => println!("  shutdown: ?"),
                }
                println!();
                match all {
                    DeviceInfo::Parsed(all) => {
                        println!("  bt_name: {}", all.bt_name);
                        println!("  mac_classic: {}", all.mac_classic);
                        println!("  mac_ble: {}", all.mac_ble);
                        println!("  firmware: {}", all.firmware);
                        println!("  serial: {}", all.serial);
                        println!("  battery: {}%", all.battery);
                    }
                    DeviceInfo::Raw { raw } => println!("  raw: {}", raw),
                    DeviceInfo::Empty => {}
                }
                Ok(())
            })
            .await
        }

        Commands::Status => {
            with_printer(&link, |printer| async move {
                let status = printer.get_status().await?;
                println!("  Status: {}", status);
                println!("  Raw: 0x{:02X} ({:08b})", status.raw, status.raw);
                println!(
                    "  printing={} cover_open={} no_paper={} low_battery={} overheated={} charging={}",
                    status.printing,
                    status.cover_open,
                    status.no_paper,
                    status.low_battery,
                    status.overheated,
                    status.charging
                );
                Ok(())
            })
            .await
        }

        Commands::Text {
            text,
            font_size,
            print,
        } => {
            let text = text.join(" ");
            let rows = print.label_rows()?;
            let label = text::text_to_image(&text, font_size, rows as u32)?;
            let raster = render::prepare(&image::DynamicImage::ImageLuma8(label), rows, false)?;
            println!("Printing \"{}\"...", text);
            print_raster(&link, raster, &print).await
        }

        Commands::Image {
            path,
            no_dither,
            print,
        } => {
            let rows = print.label_rows()?;
            let img = image::open(&path).map_err(|e| {
                FicheroError::Image(format!("Failed to open {}: {}", path.display(), e))
            })?;
            let raster = render::prepare(&img, rows, !no_dither)?;
            println!("Printing {}...", path.display());
            print_raster(&link, raster, &print).await
        }

        Commands::Set { setting, value } => {
            let request = parse_setting(setting, &value)?;
            with_printer(&link, |printer| async move {
                let (name, ok) = match request {
                    SettingValue::Density(d) => ("density", printer.set_density(d).await?),
                    SettingValue::Shutdown(m) => ("shutdown", printer.set_shutdown_time(m).await?),
                    SettingValue::Paper(p) => ("paper", printer.set_paper_type(p).await?),
                };
                println!("  Set {}={}: {}", name, value, if ok { "OK" } else { "FAILED" });
                Ok(())
            })
            .await
        }
    }
}

/// Connect, run `body`, and close the link whatever the outcome.
async fn with_printer<F, Fut>(link: &Link, body: F) -> Result<()>
where
    F: FnOnce(std::sync::Arc<Printer>) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let printer = std::sync::Arc::new(Printer::connect(link).await?);
    let result = body(std::sync::Arc::clone(&printer)).await;
    if let Err(e) = printer.close().await {
        warn!("Close failed: {}", e);
    }
    result
}

/// Print a prepared raster, or save it as PNG when `--png` is given.
async fn print_raster(link: &Link, raster: Raster, args: &PrintArgs) -> Result<()> {
    if let Some(png_path) = &args.png {
        save_png(png_path, &raster)?;
        println!("Saved {}x{} to {}", raster.width, raster.rows, png_path.display());
        return Ok(());
    }

    let density = Density::try_from(args.density).map_err(FicheroError::InvalidCommand)?;
    println!(
        "  Image: {}x{}, {} bytes, {} copies",
        raster.width,
        raster.rows,
        raster.data.len(),
        args.copies
    );
    let job = PrintJob::new(raster, density, args.paper, args.copies)?;

    with_printer(link, |printer| async move {
        let report = printer.print(&job).await?;
        if report.all_acknowledged() {
            println!("Done.");
        } else {
            println!("Done (printer did not confirm every copy).");
        }
        Ok(())
    })
    .await
}

/// Save raster data as a PNG image
fn save_png(path: &Path, raster: &Raster) -> Result<()> {
    raster
        .to_image()
        .save(path)
        .map_err(|e| FicheroError::Image(format!("Failed to save PNG: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_label_length_in_mm() {
        let cli = Cli::parse_from(["fichero", "text", "hi", "--label-length", "30"]);
        let Commands::Text { print, .. } = cli.command else {
            panic!("expected text command");
        };
        assert_eq!(print.label_rows().unwrap(), 240);
        assert_eq!(print.density, 2);
        assert_eq!(print.paper, PaperType::Gap);
    }

    #[test]
    fn test_density_range_enforced() {
        assert!(Cli::try_parse_from(["fichero", "image", "x.png", "--density", "3"]).is_err());
        assert!(Cli::try_parse_from(["fichero", "image", "x.png", "--copies", "0"]).is_err());
    }

    #[test]
    fn test_parse_setting() {
        assert!(matches!(
            parse_setting(Setting::Density, "1"),
            Ok(SettingValue::Density(Density::Medium))
        ));
        assert!(parse_setting(Setting::Density, "3").is_err());
        assert!(matches!(
            parse_setting(Setting::Shutdown, "480"),
            Ok(SettingValue::Shutdown(480))
        ));
        assert!(parse_setting(Setting::Shutdown, "0").is_err());
        assert!(parse_setting(Setting::Shutdown, "481").is_err());
        assert!(matches!(
            parse_setting(Setting::Paper, "black"),
            Ok(SettingValue::Paper(PaperType::BlackMark))
        ));
        assert!(parse_setting(Setting::Paper, "roll").is_err());
    }
}
