use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use plotkit::{
    init_logging, list_ports, optimize, ConnectionDriver, GcodePost, Machine, MachineCatalog,
    MachineProfile, OptimizerConfig, PlotWorker, Plottable, Response, Status,
};

#[derive(Parser, Debug)]
#[command(name = "plotkit", version = plotkit::VERSION)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports, plotter-likely ones first.
    Ports,
    /// List known machine profiles.
    Machines,
    /// Order line art and write the resulting G-code.
    Post(PostArgs),
    /// Stream a G-code file to a machine.
    Send(SendArgs),
}

#[derive(Parser, Debug)]
struct PostArgs {
    /// Line-art JSON (a plottable: chunks of points).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output G-code path; stdout if omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Machine profile supplying feed rate and pen-drag threshold.
    #[arg(long, default_value = "plotkit_v1")]
    machine: String,

    /// Endpoint-scan window of the order optimizer.
    #[arg(long, default_value_t = 100)]
    lookahead: usize,

    /// Skip the order optimizer and post the chunks as-is.
    #[arg(long, default_value_t = false)]
    no_optimize: bool,
}

#[derive(Parser, Debug)]
struct SendArgs {
    /// G-code file to stream.
    file: PathBuf,

    /// Machine profile to drive.
    #[arg(long, default_value = "plotkit_v1")]
    machine: String,

    /// Serial port override (e.g. /dev/ttyUSB0).
    #[arg(long)]
    port: Option<String>,

    /// TCP host override; switches the profile to the TCP driver.
    #[arg(long)]
    host: Option<String>,
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    match cli.cmd {
        Command::Ports => cmd_ports(),
        Command::Machines => cmd_machines(),
        Command::Post(args) => cmd_post(args),
        Command::Send(args) => cmd_send(args),
    }
}

fn cmd_ports() -> anyhow::Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
        return Ok(());
    }
    for port in ports {
        println!("{}\t{}", port.port_name, port.description);
    }
    Ok(())
}

fn cmd_machines() -> anyhow::Result<()> {
    let catalog = MachineCatalog::builtin();
    for name in catalog.names() {
        let profile = catalog.get(name).unwrap();
        println!(
            "{}\t{:.0}x{:.0} mm\t{}",
            name,
            profile.limits.max.x - profile.limits.min.x,
            profile.limits.max.y - profile.limits.min.y,
            profile.connection.driver
        );
    }
    Ok(())
}

fn profile_for(name: &str) -> anyhow::Result<MachineProfile> {
    MachineCatalog::builtin()
        .get(name)
        .cloned()
        .with_context(|| format!("unknown machine profile: {name}"))
}

fn cmd_post(args: PostArgs) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.in_path)
        .with_context(|| format!("reading {}", args.in_path.display()))?;
    let art: Plottable = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.in_path.display()))?;

    let ordered = if args.no_optimize {
        art
    } else {
        let config = OptimizerConfig {
            lookahead: args.lookahead,
        };
        let mut report = |phase: &str, remaining: usize, total: usize| {
            eprintln!("{phase}: {remaining}/{total} chunks left");
        };
        optimize(art, &config, Some(&mut report))
    };

    let profile = profile_for(&args.machine)?;
    let program = GcodePost::from_settings(&profile.post).program(&ordered);
    match args.out {
        Some(path) => {
            fs::write(&path, program).with_context(|| format!("writing {}", path.display()))?
        }
        None => print!("{program}"),
    }
    Ok(())
}

fn cmd_send(args: SendArgs) -> anyhow::Result<()> {
    let program = fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let mut profile = profile_for(&args.machine)?;
    if let Some(port) = args.port {
        profile.connection.driver = ConnectionDriver::Serial;
        profile.connection.port = port;
    }
    if let Some(host) = args.host {
        profile.connection.driver = ConnectionDriver::Tcp;
        profile.connection.host = host;
    }

    let worker = PlotWorker::spawn(Machine::from_profile(profile))?;
    let job = Uuid::new_v4().to_string();
    worker.send(&format!("LOAD[{job}]:{program}"))?;
    await_ok(&worker, &job)?;
    worker.send(&format!("START[{job}]"))?;

    // Echo progress until the start command resolves.
    loop {
        while let Some(progress) = worker.try_progress() {
            println!("[{}/{}] {}", progress.index + 1, progress.total, progress.command);
        }
        if let Some(line) = worker.recv_timeout(Duration::from_millis(100)) {
            let response = Response::parse(&line)?;
            if response.id == job {
                match response.status {
                    Status::Ok => {
                        println!("done");
                        return Ok(());
                    }
                    Status::Err | Status::Fatal => {
                        bail!(
                            "plot failed: {}",
                            response.error_message().unwrap_or("unknown error")
                        )
                    }
                }
            }
        }
    }
}

fn await_ok(worker: &PlotWorker, id: &str) -> anyhow::Result<()> {
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while std::time::Instant::now() < deadline {
        if let Some(line) = worker.recv_timeout(Duration::from_millis(100)) {
            let response = Response::parse(&line)?;
            if response.id == id {
                match response.status {
                    Status::Ok => return Ok(()),
                    _ => bail!(
                        "command rejected: {}",
                        response.error_message().unwrap_or("unknown error")
                    ),
                }
            }
        }
    }
    bail!("no response from worker within 10s")
}
