use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use containmesh::api::{self, StatusFeed, DEFAULT_API_ADDR};
use containmesh::config::MeshConfig;
use containmesh::config_loader;
use containmesh::console;
use containmesh::mesh::ReapOptions;
use containmesh::orchestrator::{self, Session};
use containmesh::progress::LogSink;
use containmesh::topology::acquire;
use containmesh::utils::{write_connect_script, CONNECT_SCRIPT_NAME};

/// Build a mesh of isolated container networks on the local Docker host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image every container runs
    #[arg(short, long, default_value = "test_name")]
    image: String,

    /// Number of containers per network
    #[arg(short, long, default_value_t = 5)]
    containers: usize,

    /// Number of networks
    #[arg(short, long, default_value_t = 1)]
    networks: usize,

    /// Name prefix of the networks
    #[arg(short = 'N', long, default_value = "test_network")]
    network_name: String,

    /// Number of containers of a network joining each linked network
    #[arg(short, long, default_value_t = 1)]
    links: usize,

    /// Directory containing the Dockerfile
    #[arg(long, default_value = "./")]
    path: PathBuf,

    /// Build the image from the Dockerfile before creating the mesh
    #[arg(long)]
    build: bool,

    /// Pull the image from docker.io/library
    #[arg(short, long)]
    pull: bool,

    /// YAML configuration file; values present there override the flags
    #[arg(short, long)]
    yaml: Option<PathBuf>,

    /// Run the containers in privileged mode
    #[arg(long)]
    privileged: bool,

    /// Create the containers of a network in parallel
    #[arg(long)]
    parallel: bool,

    /// Skip the menu: build, print the status as JSON and leave the mesh up
    #[arg(long)]
    headless: bool,

    /// Only remove the containers and networks of a previous run
    #[arg(long)]
    reap_only: bool,

    /// Do not remove the mesh on exit
    #[arg(long)]
    keep: bool,

    /// Use an in-memory runtime instead of Docker
    #[arg(long)]
    dry_run: bool,

    /// Docker binary the connect script invokes
    #[arg(long, default_value = "docker")]
    docker: PathBuf,

    /// Serve the mesh status read-only at http://<ADDR>/api/graph while the menu runs
    #[arg(long, value_name = "ADDR", num_args = 0..=1, default_missing_value = DEFAULT_API_ADDR)]
    api: Option<SocketAddr>,

    /// Path of the generated connect helper script
    #[arg(long, default_value = CONNECT_SCRIPT_NAME)]
    script: PathBuf,
}

impl Args {
    fn to_config(&self) -> MeshConfig {
        MeshConfig {
            image_name: self.image.clone(),
            dockerfile_path: self.path.clone(),
            build_image: self.build,
            pull_image: self.pull,
            network_name: self.network_name.clone(),
            num_containers: self.containers,
            num_networks: self.networks,
            num_links: self.links,
            net_matrix: None,
            privileged: self.privileged,
            parallel_creation: self.parallel,
            stop_timeout: None,
            docker_binary: self.docker.clone(),
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting ContainMesh");
    let config = config_loader::resolve_config(args.to_config(), args.yaml.as_deref())?;
    let runtime = orchestrator::runtime_for(&config, args.dry_run)?;
    let runtime = runtime.as_ref();
    let topology = config.topology();

    // Remove leftovers of a previous run that used the same names
    println!("Deleting the environment...");
    orchestrator::run_teardown(runtime, &topology, ReapOptions::default(), console::print_progress)?;
    if args.reap_only {
        info!("Reap-only run completed");
        return Ok(());
    }

    orchestrator::prepare_image(runtime, &config, &LogSink)?;

    let matrix = acquire(
        topology.group_count,
        config.supplied_matrix(),
        &mut io::stdin().lock(),
        &mut io::stdout(),
    )
    .wrap_err("Failed to acquire the adjacency matrix")?;

    println!("Setting up the environment...");
    let environment =
        orchestrator::run_build(runtime, &topology, &matrix, config.build_options(), console::print_progress)?;

    let docker = config.docker_binary.to_string_lossy();
    write_connect_script(&args.script, &topology, &docker)?;
    info!("Bash script successfully created: {:?}", args.script);

    let mut session = Session::new(runtime, environment);
    let _api = match args.api {
        Some(addr) => {
            let server = api::serve(addr, StatusFeed::new(session.status()))?;
            session = session.with_status_feed(server.feed());
            Some(server)
        }
        None => None,
    };
    let live = session.live_nodes()?;
    info!(
        "{} of {} nodes running",
        live.values().filter(|running| **running).count(),
        session.total_nodes()
    );

    if args.headless {
        println!("{}", session.status().to_json()?);
        info!("Headless run: the mesh is left up, remove it with --reap-only");
        return Ok(());
    }

    let menu = console::run_menu(&mut session, &mut io::stdin().lock(), &mut io::stdout());
    if let Err(err) = &menu {
        warn!("Menu failed: {}", err);
    }

    if args.keep {
        info!("Keeping the mesh, remove it later with --reap-only");
        return menu;
    }

    println!("Deleting the environment...");
    session.teardown(ReapOptions::default(), console::print_progress)?;
    fs::remove_file(&args.script)
        .wrap_err_with(|| format!("Failed to remove script '{}'", args.script.display()))?;

    info!("Environment removed");
    menu
}
