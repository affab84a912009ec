// labtester -- drives cellular modules through provisioning and
// connectivity runs while a power recorder captures the trace.
//
// Usage:
//   labtester --device /dev/ttyUSB0 --type n2 run
//   labtester --device /dev/ttyUSB0 --type n2 run --echo --recorder ./otii-record
//   labtester --device /dev/ttyUSB0 --type r4 --spec-file r4-cereg.toml run --no-record
//   labtester --device /dev/ttyUSB0 --type n2 ids
//   labtester families
//   labtester serve --listen 0.0.0.0:1234

mod echo;
mod recorder;
mod sequence;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use atlab_core::CellularDevice;
use atlab_ublox::models::{all_families, lookup_family};
use atlab_ublox::{AtDevice, AtDeviceBuilder, DeviceSpec};

use crate::echo::EchoServer;
use crate::recorder::{ExternalRecorder, NullRecorder, PowerRecorder};
use crate::sequence::{RunConfig, TestRun};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// labtester -- provisioning, connectivity, and power-trace runs for
/// cellular modules.
#[derive(Parser)]
#[command(name = "labtester", version, about)]
struct Cli {
    /// Serial device the module is attached to.
    #[arg(long, global = true, default_value = "/dev/ttyUSB0")]
    device: String,

    /// Module family (see `labtester families`).
    #[arg(long = "type", global = true, default_value = "n2")]
    family: String,

    /// TOML file with the family's command templates. Overrides --type.
    #[arg(long, global = true)]
    spec_file: Option<PathBuf>,

    /// Override the family's baud rate.
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Log every command and reply line.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for run log files.
    #[arg(long, global = true, default_value = "captures")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision the module, register, and send packets while recording.
    Run(RunArgs),
    /// Print IMSI and IMEI.
    Ids,
    /// List built-in module families.
    Families,
    /// Run the UDP server the module sends to.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:1234")]
        listen: SocketAddr,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Access point name.
    #[arg(long, default_value = "tdt2.telenor.iot")]
    apn: String,

    /// Address of the UDP server.
    #[arg(long, default_value = "10.0.0.1")]
    server_ip: IpAddr,

    #[arg(long, default_value_t = 1234)]
    server_port: u16,

    /// Local port the module's socket listens on.
    #[arg(long, default_value_t = 1234)]
    listen_port: u16,

    /// Number of packets to send.
    #[arg(long, default_value_t = 3)]
    packets: u32,

    /// Send `echo hi` and read the server's reply for every packet.
    #[arg(long)]
    echo: bool,

    /// Power recorder program, invoked as `<program> calibrate` and
    /// `<program> record <ms>`.
    #[arg(long, conflicts_with = "no_record")]
    recorder: Option<PathBuf>,

    /// Length of the power recording in seconds.
    #[arg(long, default_value_t = 30)]
    record_secs: u64,

    /// Skip power recording.
    #[arg(long)]
    no_record: bool,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install console and file logging. The returned guard flushes the file
/// writer and must be held until exit.
fn init_logging(log_dir: &Path, tag: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    let file_name = format!(
        "labtester-{}-{}.log",
        tag,
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    info!(file = %log_dir.join(&file_name).display(), "Logging to file");
    Ok(guard)
}

// ---------------------------------------------------------------------------
// Device setup
// ---------------------------------------------------------------------------

fn resolve_spec(cli: &Cli) -> Result<DeviceSpec> {
    if let Some(path) = &cli.spec_file {
        return DeviceSpec::from_file(path)
            .with_context(|| format!("cannot load spec file {}", path.display()));
    }
    lookup_family(&cli.family).ok_or_else(|| {
        let known: Vec<&str> = all_families().iter().map(|(alias, _)| *alias).collect();
        anyhow!(
            "unknown module type '{}' (known: {})",
            cli.family,
            known.join(", ")
        )
    })
}

/// File-name tag for the run log.
fn log_tag(cli: &Cli) -> String {
    match resolve_spec(cli) {
        Ok(spec) => spec.name.to_ascii_lowercase(),
        Err(_) => cli.family.to_ascii_lowercase(),
    }
}

async fn open_device(cli: &Cli) -> Result<AtDevice> {
    let spec = resolve_spec(cli)?;
    let mut builder = AtDeviceBuilder::new(spec)
        .serial_port(&cli.device)
        .verbose(cli.verbose);
    if let Some(baud) = cli.baud {
        builder = builder.baud_rate(baud);
    }
    let device = builder
        .build()
        .await
        .with_context(|| format!("couldn't open {}", cli.device))?;
    let info = device.info();
    info!(device = %cli.device, family = %info.family, baud = info.baud_rate, "Connected");

    device
        .check_alive()
        .await
        .context("device did not answer AT")?;
    Ok(device)
}

fn build_recorder(args: &RunArgs) -> Arc<dyn PowerRecorder> {
    match (&args.recorder, args.no_record) {
        (_, true) => Arc::new(NullRecorder),
        (Some(program), false) => Arc::new(ExternalRecorder::new(program)),
        (None, false) => {
            warn!("No --recorder given, power trace will not be captured");
            Arc::new(NullRecorder)
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let recorder = build_recorder(args);
    recorder.calibrate().await.context("calibration failed")?;

    let device = open_device(cli).await?;
    let config = RunConfig {
        apn: args.apn.clone(),
        server_ip: args.server_ip,
        server_port: args.server_port,
        listen_port: args.listen_port,
        packets: args.packets,
        echo: args.echo,
        record_duration: Duration::from_secs(args.record_secs),
        ..RunConfig::default()
    };

    let result = TestRun::new(&device, recorder, config).execute().await;
    if let Err(e) = device.close().await {
        warn!(error = %e, "Closing device failed");
    }
    let report = result?;
    println!(
        "Registered after {} poll(s), sent {} packet(s)",
        report.registration_polls, report.packets_sent
    );
    for reply in &report.echoes {
        println!("Echo: {}", String::from_utf8_lossy(reply));
    }
    Ok(())
}

async fn cmd_ids(cli: &Cli) -> Result<()> {
    let device = open_device(cli).await?;
    let imsi = device.imsi().await;
    let imei = device.imei().await;
    device.close().await.ok();

    match &imsi {
        Ok(imsi) => println!("IMSI: {imsi}"),
        Err(e) => error!(error = %e, "Couldn't get IMSI"),
    }
    match &imei {
        Ok(imei) => println!("IMEI: {imei}"),
        Err(e) => error!(error = %e, "Couldn't get IMEI"),
    }
    if imsi.is_err() || imei.is_err() {
        bail!("identity query failed");
    }
    Ok(())
}

fn cmd_families() -> Result<()> {
    println!("{:<6} {:<10} {:>7}  Intents", "Alias", "Family", "Baud");
    for (alias, spec) in all_families() {
        let intents: Vec<&str> = spec.supported().iter().map(|i| i.key()).collect();
        println!(
            "{:<6} {:<10} {:>7}  {}",
            alias,
            spec.name,
            spec.baud_rate,
            intents.join(", ")
        );
    }
    Ok(())
}

async fn cmd_serve(listen: SocketAddr) -> Result<()> {
    let server = EchoServer::bind(listen).await?;
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for ctrl-c")?;
    shutdown.cancel();
    task.await.context("server task failed")?
}

fn report_failure(e: &anyhow::Error) {
    error!("==============================");
    error!("=========== FAILED ===========");
    error!("==============================");
    error!("{e:#}");
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Listing families needs neither a device nor a log file.
    if matches!(cli.command, Command::Families) {
        return cmd_families();
    }

    let tag = match &cli.command {
        Command::Serve { .. } => "server".to_string(),
        _ => log_tag(&cli),
    };
    let _guard = init_logging(&cli.log_dir, &tag)?;

    let result = match &cli.command {
        Command::Run(args) => cmd_run(&cli, args).await,
        Command::Ids => cmd_ids(&cli).await,
        Command::Serve { listen } => cmd_serve(*listen).await,
        Command::Families => unreachable!("handled above"),
    };

    if let Err(e) = &result {
        report_failure(e);
    }
    result
}
