//! flopbench command-line interface.
//!
//! `flopbench cpu` and `flopbench gpu` run the FMA warmup, the matrix
//! sweep, and the kernel chain on the respective backend; `flopbench all`
//! runs both; `flopbench info` just enumerates and selects. Setup failures
//! (no platform, no device, context/queue/compilation) exit with status 1;
//! a correctness mismatch is reported but does not change the exit status.

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use flopbench_common::system_info::{probe_gpu_power, probe_host_cpu};
use flopbench_driver::{
    header, run_chain_scenario, run_fma_warmup, run_matrix_scenario, section, ExecutionBackend,
    GpuBackend, GpuOptions, HostBackend, ReportDocument,
};
use flopbench_opencl::{
    enumerate_gpu_platforms, select_best, KernelSource, QueueProperties, QueueStrategy, RankTable,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flopbench")]
#[command(version)]
#[command(about = "GFLOPS and memory-bandwidth diagnostics for CPU threads and OpenCL GPUs")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark the host CPU via the thread fan-out path
    Cpu(CpuArgs),
    /// Benchmark the selected OpenCL GPU
    Gpu(GpuArgs),
    /// Benchmark the CPU, then the GPU
    All(AllArgs),
    /// Show the selected device, platform policy, and system state
    Info,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Matrix sizes to sweep
    #[arg(long, value_delimiter = ',', default_values = ["512", "1024", "2048"])]
    sizes: Vec<usize>,

    /// Timed runs per size (default: 5, and 3 for sizes ≥ 2048)
    #[arg(long, value_name = "N")]
    runs: Option<usize>,

    /// Skip the FMA warmup stress pass
    #[arg(long)]
    skip_warmup: bool,

    /// Emit the report as JSON instead of text
    #[arg(long, value_enum, default_value = "text", value_name = "FORMAT")]
    format: OutputFormat,
}

#[derive(Args, Clone)]
struct CpuArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Worker thread count (default: one per logical core)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,
}

#[derive(Args, Clone)]
struct GpuArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Queue construction entry point. The modern path hangs on some
    /// drivers; switching to it is an explicit operator decision.
    #[arg(long, value_enum, default_value_t = QueuePath::Legacy)]
    queue_path: QueuePath,

    /// Disable event profiling on the command queue
    #[arg(long)]
    no_profiling: bool,

    /// Enable out-of-order execution on the command queue
    #[arg(long)]
    out_of_order: bool,

    /// Load kernel source from a file instead of the embedded copy
    #[arg(long, value_name = "PATH")]
    kernel_file: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct AllArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Worker thread count for the CPU pass
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Queue construction entry point for the GPU pass
    #[arg(long, value_enum, default_value_t = QueuePath::Legacy)]
    queue_path: QueuePath,

    /// Disable event profiling on the command queue
    #[arg(long)]
    no_profiling: bool,

    /// Enable out-of-order execution on the command queue
    #[arg(long)]
    out_of_order: bool,

    /// Load kernel source from a file instead of the embedded copy
    #[arg(long, value_name = "PATH")]
    kernel_file: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum QueuePath {
    Legacy,
    Modern,
}

impl From<QueuePath> for QueueStrategy {
    fn from(path: QueuePath) -> Self {
        match path {
            QueuePath::Legacy => Self::Legacy,
            QueuePath::Modern => Self::Modern,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = run(cli) {
        error!("{e:#}");
        eprintln!("{} {e:#}", style("error:").red().bold());
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_owned()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Cpu(args) => run_cpu(&args),
        Commands::Gpu(args) => run_gpu(&args),
        Commands::All(args) => {
            run_cpu(&CpuArgs { common: args.common.clone(), threads: args.threads })?;
            run_gpu(&GpuArgs {
                common: args.common.clone(),
                queue_path: args.queue_path,
                no_profiling: args.no_profiling,
                out_of_order: args.out_of_order,
                kernel_file: args.kernel_file.clone(),
            })
        }
        Commands::Info => run_info(),
    }
}

/// Expand `--sizes`/`--runs` into the (size, runs) sweep plan.
fn sweep_plan(common: &CommonArgs) -> Vec<(usize, usize)> {
    common
        .sizes
        .iter()
        .map(|&n| (n, common.runs.unwrap_or(if n >= 2048 { 3 } else { 5 })))
        .collect()
}

fn run_cpu(args: &CpuArgs) -> Result<()> {
    let mut backend = match args.threads {
        Some(threads) => HostBackend::with_workers(threads),
        None => HostBackend::new(),
    };

    if args.common.format == OutputFormat::Text {
        println!("{}", header("CPU PARALLEL MATRIX MULTIPLICATION"));
        print_cpu_state();
        println!("\n✓ using {} worker threads", backend.workers());
    }

    let doc = run_suite(&mut backend, &args.common, false)?;
    finish(&doc, &args.common)
}

fn run_gpu(args: &GpuArgs) -> Result<()> {
    let kernel_source = match &args.kernel_file {
        Some(path) => KernelSource::from_path(path)
            .with_context(|| format!("loading kernel source from {}", path.display()))?,
        None => KernelSource::embedded(flopbench_kernels::MATRIX_KERNELS_SRC),
    };

    let mut properties = QueueProperties::none();
    if !args.no_profiling {
        properties = properties.with_profiling();
    }
    if args.out_of_order {
        properties = properties.with_out_of_order();
    }

    let options = GpuOptions {
        rank_table: RankTable::default(),
        strategy: args.queue_path.into(),
        properties,
        kernel_source,
    };

    if args.common.format == OutputFormat::Text {
        println!("{}", header("OPENCL PARALLEL MATRIX MULTIPLICATION"));
        print_gpu_state();
    }

    let mut backend = GpuBackend::initialize(options).context("GPU setup failed")?;
    if args.common.format == OutputFormat::Text {
        println!("\n{}", section("SELECTED DEVICE"));
        print_selected(&backend);
    }

    let doc = run_suite(&mut backend, &args.common, true)?;
    finish(&doc, &args.common)
}

/// Warmup, matrix sweep, chain: the same sequence for either backend.
fn run_suite(
    backend: &mut dyn ExecutionBackend,
    common: &CommonArgs,
    with_gpu_power: bool,
) -> Result<ReportDocument> {
    let text = common.format == OutputFormat::Text;
    let mut scenarios = Vec::new();

    if !common.skip_warmup {
        if text {
            println!("\n{}", section("FMA STRESS (WARMUP)"));
        }
        let outcome = run_fma_warmup(backend)?;
        if text {
            print!("{outcome}");
        }
        scenarios.push(outcome);
    }

    if text {
        println!("\n{}", section("MATRIX MULTIPLY"));
    }
    for (n, runs) in sweep_plan(common) {
        let outcome = run_matrix_scenario(backend, n, runs)?;
        if text {
            print!("\n{outcome}");
        }
        scenarios.push(outcome);
    }

    if text {
        println!("\n{}", section("KERNEL CHAIN"));
    }
    let chain = run_chain_scenario(backend)?;
    if text {
        print!("{chain}");
    }

    let gpu_power = with_gpu_power.then(probe_gpu_power).filter(|p| !p.is_empty());
    Ok(ReportDocument {
        backend: backend.name().to_owned(),
        host_cpu: probe_host_cpu(),
        gpu_power,
        scenarios,
        chain: Some(chain),
    })
}

fn finish(doc: &ReportDocument, common: &CommonArgs) -> Result<()> {
    match common.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(doc)?),
        OutputFormat::Text => {
            let verdict = if doc.all_passed() {
                style("✓ all scenarios completed").green().to_string()
            } else {
                style("✗ correctness mismatch in at least one scenario").red().to_string()
            };
            println!("\n{verdict}");
        }
    }
    // A mismatch is reported, not fatal: the run itself completed.
    Ok(())
}

fn run_info() -> Result<()> {
    println!("{}", header("FLOPBENCH DEVICE AND SYSTEM INFO"));
    print_cpu_state();
    print_gpu_state();

    println!("\n{}", section("PLATFORM POLICY"));
    let table = RankTable::default();
    for rule in table.rules() {
        println!("  rank {}: \"{}\" ({})", rule.rank, rule.needle, rule.rationale);
    }

    println!("\n{}", section("ENUMERATION"));
    let candidates = enumerate_gpu_platforms().context("enumeration failed")?;
    for candidate in &candidates {
        println!("  platform: {}", candidate.platform.name);
        for device in &candidate.devices {
            println!(
                "    {} ({}): {} CUs, {} MB, {} MHz, max work-group {}",
                device.name,
                device.vendor,
                device.compute_units,
                device.global_mem_bytes / (1024 * 1024),
                device.max_clock_mhz,
                device.max_work_group_size,
            );
        }
    }

    let selected = select_best(candidates, &table).context("selection failed")?;
    println!("\n{}", section("SELECTED DEVICE"));
    println!("  {} on {}", selected.device.name, selected.platform.name);
    if let Some(rationale) = &selected.rationale {
        println!("  policy: {rationale}");
    }
    Ok(())
}

fn print_cpu_state() {
    let cpu = probe_host_cpu();
    println!("\n{}", section("PROCESSOR"));
    if let Some(model) = &cpu.model {
        println!("  model:    {model}");
    }
    println!("  cores:    {}", cpu.logical_cores);
    if let Some(governor) = &cpu.governor {
        println!("  governor: {governor}");
    }
}

fn print_gpu_state() {
    let power = probe_gpu_power();
    if power.is_empty() {
        return;
    }
    println!("\n{}", section("GPU POWER STATE"));
    if let Some(state) = &power.dpm_state {
        println!("  DPM state:         {state}");
    }
    if let Some(level) = &power.performance_level {
        println!("  performance level: {level}");
    }
}

fn print_selected(backend: &GpuBackend) {
    let selected = backend.selected();
    println!("  platform: {}", selected.platform.name);
    println!("  device:   {}", selected.device.name);
    println!("  compute:  {} CUs @ {} MHz", selected.device.compute_units, selected.device.max_clock_mhz);
    println!("  memory:   {} MB", selected.device.global_mem_bytes / (1024 * 1024));
    println!("  max work-group: {}", selected.device.max_work_group_size);
    if let Some(rationale) = &selected.rationale {
        println!("  policy:   {rationale}");
    }
}
