use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serialport::SerialPortType;
use structopt::StructOpt;

use nanocap_shared::config::DEFAULT_RLE_TIMEOUT_DIVISOR;
use nanocap_shared::device::{USB_PID, USB_VID};
use nanocap_shared::{CaptureConfig, CaptureRequest, DeviceKind, SerialLink};

mod capture;
mod screenshot;

#[derive(Debug, StructOpt)]
#[structopt(name = "nanocap", about = "Screen capture for NanoVNA, tinySA and tinyPFA")]
struct Opt {
    /// Serial port. Found by USB id when not given
    #[structopt(short = "c", long = "com", parse(from_os_str))]
    serial: Option<PathBuf>,
    /// tinysa, tinysaultra, nanovnah, nanovnah4 or tinypfa
    #[structopt(short = "t", long = "device-type", default_value = "nanovnah")]
    device: DeviceKind,
    /// Output file name, without extension
    #[structopt(short, long)]
    out: Option<String>,
    /// Scale factor for the saved image
    #[structopt(short, long, default_value = "2")]
    scale: f32,
    /// Ask for a run length compressed capture
    #[structopt(long)]
    rle: bool,
    #[structopt(long, default_value = "115200")]
    baud: u32,
    /// Handshake timeout in milliseconds
    #[structopt(long = "timeout-ms", default_value = "1000")]
    timeout_ms: u64,
    /// Compressed transfers get the raw transfer timeout divided by this
    #[structopt(long = "rle-divisor")]
    rle_divisor: Option<u32>,
    #[structopt(short, long)]
    debug: bool,
    /// List serial ports and exit
    #[structopt(long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let loglevel = if opt.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new().filter_level(loglevel).init();

    if opt.list {
        return list_ports();
    }

    let path_serialport = if let Some(path) = opt.serial {
        path
    } else {
        SerialLink::find_port(USB_VID, USB_PID)?
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("device not found"))?
    };

    log::info!("Using {} on {}", opt.device, path_serialport.display());

    let mut link = SerialLink::connect(&path_serialport, opt.baud)
        .with_context(|| format!("opening {}", path_serialport.display()))?;

    let config = CaptureConfig {
        baud_rate: opt.baud,
        handshake_timeout: Duration::from_millis(opt.timeout_ms),
        rle_timeout_divisor: opt.rle_divisor.unwrap_or(DEFAULT_RLE_TIMEOUT_DIVISOR),
        request: if opt.rle {
            CaptureRequest::Rle
        } else {
            CaptureRequest::Raw
        },
    };

    capture::command_capture(&mut link, opt.device, &config, opt.scale, opt.out)
}

fn list_ports() -> anyhow::Result<()> {
    for port in SerialLink::list_ports()? {
        match port.port_type {
            SerialPortType::UsbPort(usb) => println!(
                "{}\t{:04x}:{:04x}\t{}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}
